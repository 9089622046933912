pub type Result<T> = anyhow::Result<T>;

pub trait OptProcess {
    fn process(&self) -> Result<()>;
}

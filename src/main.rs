use std::{
    process::exit,
    time,
};

use env_logger::init_from_env;
use log::{
    error,
    info,
};
use wan2skeaf::{
    cli,
    Wan2SkeafError,
};

fn main() {
    let now = time::Instant::now();

    init_from_env(
        env_logger::Env::new().filter_or("WAN2SKEAF_LOG", "info"));

    if let Err(e) = cli::run() {
        error!("{:#}", e);
        let code = match e.downcast_ref::<Wan2SkeafError>() {
            Some(Wan2SkeafError::InputNotFound(_)) => 2,
            _ => 1,
        };
        exit(code);
    }

    info!("Time used: {:?}", now.elapsed());
}

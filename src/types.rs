use ndarray::{
    Array1,
    Array4,
};

pub type Vector<T> = Array1<T>;  // Define this type to use broadcast operations.
pub type Grid4<T>  = Array4<T>;  // (band, x, y, z)
pub type V3<T>     = [T;3];
pub type Mat33<T>  = [[T;3];3];  // 3x3 matrix

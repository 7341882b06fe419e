pub mod frame;
pub mod gateway;
pub mod position;
pub mod shift;
pub mod truck;

pub mod frame;
pub mod interval;
pub mod record;
pub mod station;
pub mod variables;

pub mod interval;
pub mod line_item;
pub mod state_machine;
pub mod subscription;

pub mod bluetooth;
pub mod frame_loop;
pub mod logging;

pub mod canvas;
pub mod classifier;
pub mod controller;
pub mod display;
pub mod gate;
pub mod input;
pub mod messages;
pub mod model;
pub mod preprocess;
pub mod render;
pub mod runtime;

pub use canvas::Canvas;
pub use controller::{ControlLoop, LoopSettings};
pub use display::{DisplaySink, Frame, SharedDisplay};
pub use gate::{Gate, GateState, UnlockPolicy};
pub use model::{Grid, Point, Prediction};

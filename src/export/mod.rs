mod delta;

pub use delta::{ExportDeltaComputer, ExportError};

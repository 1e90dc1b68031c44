//! In-memory data model accumulated across collection ticks.

pub mod measurement;
pub mod records;

pub use measurement::{Measurement, MeasurementSnapshot, Unit, bytes_to_kb};
pub use records::{
    BmemRecord, CmaRecord, ContainerRecord, FragmentationEntry, GpuRecord, MemoryData,
    ProcessInfo, ZramRecord,
};

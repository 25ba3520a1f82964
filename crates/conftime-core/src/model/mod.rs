// ── Domain model ──
//
// Attribute values and descriptors, device families with their static
// registries, and the job/outcome types dispatchers pass around.

pub mod attribute;
pub mod family;
pub mod job;

pub use attribute::{AttributeDescriptor, AttributeValue, Source, ValueKind};
pub use family::DeviceFamily;
pub use job::{DesiredState, Fault, Job, JobReport, Outcome};

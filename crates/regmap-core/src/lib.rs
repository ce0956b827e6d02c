//! Register map model, codec, prober and reporter for hardware register inspection.

/// Error taxonomy shared by every stage.
pub mod error;
pub use error::{
    ConfigError, DeviceReadError, ProbeError, ProbeFailure, ValidationError, ValidationErrorKind,
    ValueError,
};

/// Device Port contract and backends.
pub mod device;
pub use device::{
    validate_access_size, validate_alignment, AccessSize, CommandDevice, DevicePort, MockDevice,
    ReadRequest, ResourceDevice, DEFAULT_ACCESS_SIZE,
};

/// Block, register and field tree with bit-level decoding.
pub mod model;
pub use model::{
    extract_bits, format_address, BlockId, FieldId, FieldLayout, FieldSpec, Node, NodeId,
    NodeKind, ReadState, RegisterId, RegisterMap, RegisterSpec,
};

/// YAML register-map description codec.
pub mod codec;
pub use codec::{dump, dump_with_values, load_file, parse, save_file, DumpOptions};

/// Probe loop with partial-failure aggregation.
pub mod probe;
pub use probe::{probe, ProbeSummary};

/// Plain-text report rendering.
pub mod report;
pub use report::{report, summarize, ReportOptions, ReportSummary, Status};

#[cfg(test)]
use proptest as _;

//! Register-map text codec: YAML description to [`RegisterMap`] and back.
//!
//! `parse` builds the tree in declared order, wiring every field to its
//! owning register and rejecting inconsistent definitions before anything is
//! returned. `dump` is its left inverse for structural content and can carry
//! resolved raw values along to form a snapshot.

/// Serde document types.
pub mod schema;

pub use schema::{parse_number, BlockDoc, FieldDoc, Number, RegisterDoc};

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::device::AccessSize;
use crate::model::{
    BlockId, FieldLayout, FieldSpec, NodeId, ReadState, RegisterMap, RegisterSpec,
};
use crate::{ConfigError, ValidationError, ValidationErrorKind};

/// What [`dump_with`] writes besides the structural description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpOptions {
    /// Write each resolved register's raw value as `value:` and each failed
    /// read's message as `read_error:`.
    pub include_values: bool,
}

/// Parses a register-map description.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed YAML or a document of the wrong
/// shape, and [`ConfigError::Validation`] for inconsistent definitions.
pub fn parse(text: &str) -> Result<RegisterMap, ConfigError> {
    let doc: BlockDoc = serde_yaml::from_str(text).map_err(ConfigError::Parse)?;
    let map = from_document(doc)?;
    debug!(
        root = map.block(map.root()).name(),
        registers = map.register_count(),
        "parsed register map"
    );
    Ok(map)
}

/// Serializes the structural description of `map`.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if YAML rendering fails.
pub fn dump(map: &RegisterMap) -> Result<String, ConfigError> {
    dump_with(map, DumpOptions::default())
}

/// Serializes `map` together with every resolved raw value and read failure.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if YAML rendering fails.
pub fn dump_with_values(map: &RegisterMap) -> Result<String, ConfigError> {
    dump_with(
        map,
        DumpOptions {
            include_values: true,
        },
    )
}

/// Serializes `map` with explicit options.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if YAML rendering fails.
pub fn dump_with(map: &RegisterMap, options: DumpOptions) -> Result<String, ConfigError> {
    serde_yaml::to_string(&to_document(map, options)).map_err(ConfigError::Serialize)
}

/// Reads and parses a register-map file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as [`parse`].
pub fn load_file(path: &Path) -> Result<RegisterMap, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loading register map");
    parse(&text)
}

/// Writes `map` to a file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be written, otherwise as [`dump_with`].
pub fn save_file(path: &Path, map: &RegisterMap, options: DumpOptions) -> Result<(), ConfigError> {
    let text = dump_with(map, options)?;
    fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), ?options, "saved register map");
    Ok(())
}

/// Builds a tree from a deserialized document.
///
/// # Errors
///
/// Returns the first [`ValidationError`] met in declared order.
pub fn from_document(doc: BlockDoc) -> Result<RegisterMap, ValidationError> {
    let BlockDoc {
        name,
        description,
        registers,
        blocks,
    } = doc;
    let mut map = RegisterMap::new(name, description);
    let root = map.root();
    populate(&mut map, root, registers, blocks)?;
    Ok(map)
}

fn populate(
    map: &mut RegisterMap,
    block: BlockId,
    registers: Vec<RegisterDoc>,
    blocks: Vec<BlockDoc>,
) -> Result<(), ValidationError> {
    for register in registers {
        add_register(map, block, register)?;
    }
    for child in blocks {
        let id = map.add_block(block, child.name, child.description);
        populate(map, id, child.registers, child.blocks)?;
    }
    Ok(())
}

fn add_register(
    map: &mut RegisterMap,
    block: BlockId,
    doc: RegisterDoc,
) -> Result<(), ValidationError> {
    let path = format!("{}/{}", map.path(NodeId::Block(block)), doc.name);
    let size = doc
        .size
        .map(|size| {
            AccessSize::from_bytes(size).ok_or_else(|| {
                ValidationError::new(path.clone(), ValidationErrorKind::UnsupportedSize { size })
            })
        })
        .transpose()?;

    let id = map.add_register(
        block,
        RegisterSpec {
            name: doc.name,
            description: doc.description,
            address: doc.address.0,
            bar: doc.bar,
            size,
            good: doc.good.map(|good| good.0),
        },
    )?;

    for field in doc.fields {
        let layout = FieldLayout::from_parts(field.bits, field.width)
            .map_err(|kind| ValidationError::new(format!("{path}/{}", field.name), kind))?;
        map.add_field(
            id,
            FieldSpec {
                name: field.name,
                description: field.description,
                layout,
                good: field.good.map(|good| good.0),
            },
        )?;
    }

    if let Some(Number(value)) = doc.value {
        let width = map.register(id).size();
        if value & !width.mask() != 0 {
            return Err(ValidationError::new(
                path,
                ValidationErrorKind::ValueTooWide {
                    value,
                    bits: width.bits(),
                },
            ));
        }
        map.set_state(id, ReadState::Resolved(value));
    } else if let Some(message) = doc.read_error {
        map.set_state(id, ReadState::Failed(message));
    }
    Ok(())
}

/// Converts a tree back into its document form, omitting defaults.
#[must_use]
pub fn to_document(map: &RegisterMap, options: DumpOptions) -> BlockDoc {
    block_document(map, map.root(), options)
}

fn block_document(map: &RegisterMap, id: BlockId, options: DumpOptions) -> BlockDoc {
    let block = map.block(id);
    BlockDoc {
        name: block.name().to_string(),
        description: block.description().to_string(),
        registers: block
            .registers()
            .iter()
            .map(|&reg| {
                let register = map.register(reg);
                RegisterDoc {
                    address: Number(register.address()),
                    name: register.name().to_string(),
                    description: register.description().to_string(),
                    bar: register.configured_bar(),
                    size: register.configured_size().map(AccessSize::bytes),
                    good: register.good().map(Number),
                    value: if options.include_values {
                        register.value().ok().map(Number)
                    } else {
                        None
                    },
                    read_error: match register.state() {
                        ReadState::Failed(message) if options.include_values => {
                            Some(message.clone())
                        }
                        _ => None,
                    },
                    fields: register
                        .fields()
                        .iter()
                        .map(|&field| {
                            let field = map.field(field);
                            let (bits, width) = match field.layout() {
                                FieldLayout::Bits(bits) => (Some(bits.clone()), None),
                                FieldLayout::Width(width) => (None, Some(*width)),
                            };
                            FieldDoc {
                                name: field.name().to_string(),
                                description: field.description().to_string(),
                                bits,
                                width,
                                good: field.good().map(Number),
                            }
                        })
                        .collect(),
                }
            })
            .collect(),
        blocks: block
            .blocks()
            .iter()
            .map(|&child| block_document(map, child, options))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const DEVICE: &str = r"
name: nic
description: Example network controller
registers:
  - address: 0x1000
    name: CTRL
    description: Device control
    good: 0x5
    fields:
      - name: EN
        width: 1
        good: 1
      - name: MODE
        bits: [2, 1]
  - address: '0x1004'
    name: STATUS
    size: 2
blocks:
  - name: phy
    registers:
      - address: 0x40
        name: LINK
        bar: 2
        fields:
          - name: UP
            bits: [0]
            good: 1
";

    #[test]
    fn parses_tree_in_declared_order() {
        let map = parse(DEVICE).unwrap();

        let names: Vec<_> = map.walk().map(|(_, node)| node.path()).collect();
        assert_eq!(
            names,
            [
                "nic",
                "nic/CTRL",
                "nic/CTRL/EN",
                "nic/CTRL/MODE",
                "nic/STATUS",
                "nic/phy",
                "nic/phy/LINK",
                "nic/phy/LINK/UP",
            ]
        );

        let Some(NodeId::Register(ctrl)) = map.find("nic/CTRL") else {
            panic!("CTRL missing");
        };
        let ctrl = map.register(ctrl);
        assert_eq!(ctrl.address(), 0x1000);
        assert_eq!(ctrl.good(), Some(0x5));
        assert_eq!(ctrl.description(), "Device control");
        assert_eq!(ctrl.size(), AccessSize::Dword);
        assert_eq!(ctrl.configured_size(), None);
        assert_eq!(ctrl.bar(), 0);

        let Some(NodeId::Register(link)) = map.find("nic/phy/LINK") else {
            panic!("LINK missing");
        };
        assert_eq!(map.register(link).bar(), 2);
    }

    #[test]
    fn omitted_keys_take_defaults() {
        let map = parse("name: top\nregisters:\n  - address: 0\n").unwrap();
        let reg = map.register(map.registers_in_order()[0]);
        assert_eq!(reg.name(), "");
        assert_eq!(reg.description(), "");
        assert_eq!(reg.good(), None);
        assert!(reg.fields().is_empty());
        assert!(!reg.is_resolved());
    }

    #[test]
    fn unnamed_blocks_default_to_empty_names() {
        let map = parse(
            "description: unnamed device\nregisters:\n  - address: 0x10\n    name: R\nblocks:\n  - registers:\n      - address: 0x20\n        name: S\n",
        )
        .unwrap();

        let root = map.block(map.root());
        assert_eq!(root.name(), "");
        assert_eq!(root.description(), "unnamed device");
        assert_eq!(map.block(root.blocks()[0]).name(), "");
        assert_eq!(map.register_count(), 2);

        let text = dump(&map).unwrap();
        assert_eq!(parse(&text).unwrap(), map);
    }

    #[rstest]
    #[case::malformed_yaml("name: [unterminated", "")]
    #[case::missing_address("name: t\nregisters:\n  - name: NOADDR\n", "missing field `address`")]
    #[case::bad_number("name: t\nregisters:\n  - address: nope\n", "invalid decimal number 'nope'")]
    #[case::registers_not_a_list("name: t\nregisters: 12\n", "expected a sequence")]
    fn structural_errors_are_parse_errors(#[case] text: &str, #[case] expected: &str) {
        match parse(text) {
            Err(ConfigError::Parse(error)) => {
                let message = error.to_string();
                assert!(message.contains(expected), "{message:?} lacks {expected:?}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn field_layout_must_be_exactly_one_of_bits_or_width() {
        let both = "name: t\nregisters:\n  - address: 0\n    name: R\n    fields:\n      - name: F\n        bits: [0]\n        width: 1\n";
        let neither = "name: t\nregisters:\n  - address: 0\n    name: R\n    fields:\n      - name: F\n";

        match parse(both) {
            Err(ConfigError::Validation(error)) => {
                assert_eq!(error.path, "t/R/F");
                assert_eq!(error.kind, ValidationErrorKind::AmbiguousLayout);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        match parse(neither) {
            Err(ConfigError::Validation(error)) => {
                assert_eq!(error.kind, ValidationErrorKind::MissingLayout);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_size_is_a_validation_error() {
        let text = "name: t\nregisters:\n  - address: 0\n    name: R\n    size: 3\n";
        assert!(matches!(
            parse(text),
            Err(ConfigError::Validation(ValidationError {
                kind: ValidationErrorKind::UnsupportedSize { size: 3 },
                ..
            }))
        ));
    }

    #[test]
    fn dump_omits_defaults() {
        let map = parse("name: top\nregisters:\n  - address: 16\n    name: R\n").unwrap();
        let text = dump(&map).unwrap();

        assert!(text.contains("name: top"));
        assert!(text.contains("0x10"));
        assert!(!text.contains("description"));
        assert!(!text.contains("good"));
        assert!(!text.contains("fields"));
        assert!(!text.contains("blocks"));
        assert!(!text.contains("size"));
    }

    #[test]
    fn dump_then_parse_is_structurally_identical() {
        let map = parse(DEVICE).unwrap();
        let again = parse(&dump(&map).unwrap()).unwrap();
        assert_eq!(map, again);
    }

    #[test]
    fn snapshot_values_round_trip() {
        let mut map = parse(DEVICE).unwrap();
        let ids = map.registers_in_order();
        map.set_state(ids[0], ReadState::Resolved(0x5));
        map.set_state(ids[2], ReadState::Failed("timeout".into()));

        let structural = dump(&map).unwrap();
        assert!(!structural.contains("value"));

        let text = dump_with_values(&map).unwrap();
        assert!(text.contains("read_error: timeout"));

        let snapshot = parse(&text).unwrap();
        assert_eq!(snapshot.register(ids[0]).value(), Ok(0x5));
        assert_eq!(snapshot.register(ids[1]).state(), &ReadState::Pending);
        assert_eq!(
            snapshot.register(ids[2]).state(),
            &ReadState::Failed("timeout".into())
        );
        assert!(snapshot.register_is_bad(ids[2]));
    }

    #[test]
    fn snapshot_value_must_fit_register() {
        let text = "name: t\nregisters:\n  - address: 0\n    name: R\n    size: 1\n    value: 0x100\n";
        assert!(matches!(
            parse(text),
            Err(ConfigError::Validation(ValidationError {
                kind: ValidationErrorKind::ValueTooWide { value: 0x100, bits: 8 },
                ..
            }))
        ));
    }

    #[test]
    fn files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.yaml");
        let map = parse(DEVICE).unwrap();

        save_file(&path, &map, DumpOptions::default()).unwrap();
        assert_eq!(load_file(&path).unwrap(), map);

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            load_file(&missing),
            Err(ConfigError::Io { path, .. }) if path == missing
        ));
    }
}

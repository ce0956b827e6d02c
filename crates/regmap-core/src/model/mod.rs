//! Register-map tree: blocks, registers and bit-fields in one arena.
//!
//! The [`RegisterMap`] owns every node. Nodes refer to each other by id:
//! blocks list their registers and nested blocks, registers list their fields
//! and point back at their enclosing block, fields point back at the register
//! whose raw value they decode. Raw values are read once per register and
//! cached on it, so field reads never go back to the device.

/// Field layouts and bit extraction.
pub mod bits;
/// Uniform node view and depth-first walker.
pub mod node;

pub use bits::{extract_bits, low_bits, low_mask, FieldLayout};
pub use node::{format_address, Node, NodeKind, Walk};

use crate::device::{AccessSize, DEFAULT_ACCESS_SIZE};
use crate::{ValidationError, ValidationErrorKind, ValueError};

/// Index of a block in its [`RegisterMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

/// Index of a register in its [`RegisterMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(usize);

/// Index of a field in its [`RegisterMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

/// Any node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// A block.
    Block(BlockId),
    /// A register.
    Register(RegisterId),
    /// A field.
    Field(FieldId),
}

/// Outcome of the most recent read of a register.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadState {
    /// Not probed yet.
    #[default]
    Pending,
    /// Read succeeded with this raw value.
    Resolved(u64),
    /// Read failed; the message is kept for reporting.
    Failed(String),
}

/// Named grouping of registers and nested blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    name: String,
    description: String,
    parent: Option<BlockId>,
    registers: Vec<RegisterId>,
    blocks: Vec<BlockId>,
}

impl Block {
    /// Block name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description, empty when unset.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Enclosing block, `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    /// Registers in declared order.
    #[must_use]
    pub fn registers(&self) -> &[RegisterId] {
        &self.registers
    }

    /// Nested blocks in declared order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }
}

/// Construction parameters for a register.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterSpec {
    /// Register name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Address within its bar.
    pub address: u64,
    /// Region to read from; `None` means bar 0.
    pub bar: Option<u8>,
    /// Access width; `None` means [`DEFAULT_ACCESS_SIZE`].
    pub size: Option<AccessSize>,
    /// Expected raw value; `None` disables the check.
    pub good: Option<u64>,
}

impl RegisterSpec {
    /// Parameters with just a name and address; everything else at its default.
    #[must_use]
    pub fn new(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            address,
            ..Self::default()
        }
    }

    /// Sets the expected raw value.
    #[must_use]
    pub const fn good(mut self, good: u64) -> Self {
        self.good = Some(good);
        self
    }

    /// Sets the access width.
    #[must_use]
    pub const fn size(mut self, size: AccessSize) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the bar.
    #[must_use]
    pub const fn bar(mut self, bar: u8) -> Self {
        self.bar = Some(bar);
        self
    }
}

/// An addressable hardware word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    name: String,
    description: String,
    address: u64,
    bar: Option<u8>,
    size: Option<AccessSize>,
    good: Option<u64>,
    block: BlockId,
    fields: Vec<FieldId>,
    state: ReadState,
}

impl Register {
    /// Register name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description, empty when unset.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Address within its bar.
    #[must_use]
    pub const fn address(&self) -> u64 {
        self.address
    }

    /// Bar to read from.
    #[must_use]
    pub fn bar(&self) -> u8 {
        self.bar.unwrap_or(0)
    }

    /// Bar as written in the description.
    #[must_use]
    pub const fn configured_bar(&self) -> Option<u8> {
        self.bar
    }

    /// Access width.
    #[must_use]
    pub fn size(&self) -> AccessSize {
        self.size.unwrap_or(DEFAULT_ACCESS_SIZE)
    }

    /// Access width as written in the description.
    #[must_use]
    pub const fn configured_size(&self) -> Option<AccessSize> {
        self.size
    }

    /// Expected raw value, if checked.
    #[must_use]
    pub const fn good(&self) -> Option<u64> {
        self.good
    }

    /// Enclosing block.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Fields in declared order.
    #[must_use]
    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    /// Outcome of the last read.
    #[must_use]
    pub const fn state(&self) -> &ReadState {
        &self.state
    }

    /// Whether the last read produced a value.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.state, ReadState::Resolved(_))
    }

    /// Cached raw value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Unresolved`] unless the last read succeeded.
    pub fn value(&self) -> Result<u64, ValueError> {
        match self.state {
            ReadState::Resolved(value) => Ok(value),
            ReadState::Pending | ReadState::Failed(_) => Err(ValueError::Unresolved {
                register: self.name.clone(),
            }),
        }
    }
}

/// Construction parameters for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Bits of the register the field occupies.
    pub layout: FieldLayout,
    /// Expected field value; `None` disables the check.
    pub good: Option<u64>,
}

impl FieldSpec {
    /// Parameters with a name and layout; no description, no check.
    #[must_use]
    pub fn new(name: impl Into<String>, layout: FieldLayout) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            layout,
            good: None,
        }
    }

    /// Sets the expected field value.
    #[must_use]
    pub const fn good(mut self, good: u64) -> Self {
        self.good = Some(good);
        self
    }
}

/// A named bit-range of a register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    description: String,
    layout: FieldLayout,
    good: Option<u64>,
    register: RegisterId,
}

impl Field {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description, empty when unset.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Bits of the register the field occupies.
    #[must_use]
    pub const fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Expected field value, if checked.
    #[must_use]
    pub const fn good(&self) -> Option<u64> {
        self.good
    }

    /// Owning register.
    #[must_use]
    pub const fn register(&self) -> RegisterId {
        self.register
    }
}

/// Owner of a whole register tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    blocks: Vec<Block>,
    registers: Vec<Register>,
    fields: Vec<Field>,
}

impl RegisterMap {
    /// Creates a map holding only a root block.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            blocks: vec![Block {
                name: name.into(),
                description: description.into(),
                parent: None,
                registers: Vec::new(),
                blocks: Vec::new(),
            }],
            registers: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// The root block.
    #[must_use]
    pub const fn root(&self) -> BlockId {
        BlockId(0)
    }

    /// Appends a nested block to `parent`.
    pub fn add_block(
        &mut self,
        parent: BlockId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            name: name.into(),
            description: description.into(),
            parent: Some(parent),
            registers: Vec::new(),
            blocks: Vec::new(),
        });
        self.blocks[parent.0].blocks.push(id);
        id
    }

    /// Appends a register to `block`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrorKind::GoodValueTooWide`] when the expected value
    /// does not fit the register width.
    pub fn add_register(
        &mut self,
        block: BlockId,
        spec: RegisterSpec,
    ) -> Result<RegisterId, ValidationError> {
        let size = spec.size.unwrap_or(DEFAULT_ACCESS_SIZE);
        if let Some(good) = spec.good {
            if good & !size.mask() != 0 {
                let path = format!("{}/{}", self.block_path(block), spec.name);
                return Err(ValidationError::new(
                    path,
                    ValidationErrorKind::GoodValueTooWide {
                        good,
                        bits: size.bits(),
                    },
                ));
            }
        }

        let id = RegisterId(self.registers.len());
        self.registers.push(Register {
            name: spec.name,
            description: spec.description,
            address: spec.address,
            bar: spec.bar,
            size: spec.size,
            good: spec.good,
            block,
            fields: Vec::new(),
            state: ReadState::Pending,
        });
        self.blocks[block.0].registers.push(id);
        Ok(id)
    }

    /// Attaches a field to `register`, wiring its back-reference.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the layout does not fit the register
    /// or the expected value does not fit the field.
    pub fn add_field(
        &mut self,
        register: RegisterId,
        spec: FieldSpec,
    ) -> Result<FieldId, ValidationError> {
        let owner = &self.registers[register.0];
        let invalid = |kind| {
            let path = format!("{}/{}", self.register_path(register), spec.name);
            ValidationError::new(path, kind)
        };

        spec.layout.validate(owner.size().bits()).map_err(invalid)?;
        if let Some(good) = spec.good {
            let bits = spec.layout.bit_count();
            if good & !low_mask(bits) != 0 {
                return Err(invalid(ValidationErrorKind::GoodValueTooWide { good, bits }));
            }
        }

        let id = FieldId(self.fields.len());
        self.fields.push(Field {
            name: spec.name,
            description: spec.description,
            layout: spec.layout,
            good: spec.good,
            register,
        });
        self.registers[register.0].fields.push(id);
        Ok(id)
    }

    /// Looks up a block.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Looks up a register.
    #[must_use]
    pub fn register(&self, id: RegisterId) -> &Register {
        &self.registers[id.0]
    }

    /// Looks up a field.
    #[must_use]
    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    /// Number of registers in the whole tree.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Records the outcome of a read.
    pub fn set_state(&mut self, id: RegisterId, state: ReadState) {
        self.registers[id.0].state = state;
    }

    /// Forgets every read outcome.
    pub fn clear_values(&mut self) {
        for register in &mut self.registers {
            register.state = ReadState::Pending;
        }
    }

    /// Decoded value of a field.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Unresolved`] when the owning register is unresolved.
    pub fn field_value(&self, id: FieldId) -> Result<u64, ValueError> {
        let field = self.field(id);
        let raw = self.register(field.register).value()?;
        Ok(field.layout.extract(raw))
    }

    /// A field is bad when it is checked and its value is missing or differs.
    #[must_use]
    pub fn field_is_bad(&self, id: FieldId) -> bool {
        self.field(id)
            .good
            .is_some_and(|good| self.field_value(id) != Ok(good))
    }

    /// A register is bad when its read failed, its own check fails, or any field is bad.
    #[must_use]
    pub fn register_is_bad(&self, id: RegisterId) -> bool {
        let register = self.register(id);
        let own = match register.state {
            ReadState::Failed(_) => true,
            ReadState::Pending | ReadState::Resolved(_) => register
                .good
                .is_some_and(|good| register.value() != Ok(good)),
        };
        own || register.fields.iter().any(|&field| self.field_is_bad(field))
    }

    /// A block is bad when anything beneath it is bad.
    #[must_use]
    pub fn block_is_bad(&self, id: BlockId) -> bool {
        let block = self.block(id);
        block.registers.iter().any(|&reg| self.register_is_bad(reg))
            || block.blocks.iter().any(|&child| self.block_is_bad(child))
    }

    /// Slash-separated path from the root, e.g. `top/uart/CTRL/EN`.
    #[must_use]
    pub fn path(&self, id: NodeId) -> String {
        match id {
            NodeId::Block(block) => self.block_path(block),
            NodeId::Register(register) => self.register_path(register),
            NodeId::Field(field) => {
                let field = self.field(field);
                format!("{}/{}", self.register_path(field.register), field.name)
            }
        }
    }

    fn block_path(&self, id: BlockId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let block = self.block(current);
            names.push(block.name.as_str());
            cursor = block.parent;
        }
        names.reverse();
        names.join("/")
    }

    fn register_path(&self, id: RegisterId) -> String {
        let register = self.register(id);
        format!("{}/{}", self.block_path(register.block), register.name)
    }

    /// Resolves a slash-separated path produced by [`RegisterMap::path`].
    #[must_use]
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.walk()
            .map(|(_, node)| node.id())
            .find(|&id| self.path(id) == path)
    }

    /// Uniform view of any node.
    #[must_use]
    pub const fn node(&self, id: NodeId) -> Node<'_> {
        Node::new(self, id)
    }

    /// Uniform view of the root block.
    #[must_use]
    pub const fn root_node(&self) -> Node<'_> {
        Node::new(self, NodeId::Block(self.root()))
    }

    /// Depth-first walk in declared order, starting at the root.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self.root_node())
    }

    /// Registers in depth-first declared order.
    #[must_use]
    pub fn registers_in_order(&self) -> Vec<RegisterId> {
        self.walk()
            .filter_map(|(_, node)| match node.id() {
                NodeId::Register(id) => Some(id),
                NodeId::Block(_) | NodeId::Field(_) => None,
            })
            .collect()
    }
}

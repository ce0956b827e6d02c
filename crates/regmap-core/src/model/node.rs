//! One contract for blocks, registers and fields.

use std::fmt;

use super::{NodeId, ReadState, RegisterMap};
use crate::ValueError;

/// Which kind of node a [`Node`] views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Grouping of registers.
    Block,
    /// Addressable word.
    Register,
    /// Bit-range of a register.
    Field,
}

/// Borrowed view of one node of a [`RegisterMap`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    map: &'a RegisterMap,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub(crate) const fn new(map: &'a RegisterMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Id of the viewed node.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Kind of the viewed node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self.id {
            NodeId::Block(_) => NodeKind::Block,
            NodeId::Register(_) => NodeKind::Register,
            NodeId::Field(_) => NodeKind::Field,
        }
    }

    /// Node name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self.id {
            NodeId::Block(id) => self.map.block(id).name(),
            NodeId::Register(id) => self.map.register(id).name(),
            NodeId::Field(id) => self.map.field(id).name(),
        }
    }

    /// Node description, empty when unset.
    #[must_use]
    pub fn description(&self) -> &'a str {
        match self.id {
            NodeId::Block(id) => self.map.block(id).description(),
            NodeId::Register(id) => self.map.register(id).description(),
            NodeId::Field(id) => self.map.field(id).description(),
        }
    }

    /// Human-readable address: `0x` plus 16 hex digits for registers, the
    /// register address plus a bit suffix for fields, `None` for blocks.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        match self.id {
            NodeId::Block(_) => None,
            NodeId::Register(id) => Some(format_address(self.map.register(id).address())),
            NodeId::Field(id) => {
                let field = self.map.field(id);
                let register = self.map.register(field.register());
                Some(format!(
                    "{}{}",
                    format_address(register.address()),
                    field.layout()
                ))
            }
        }
    }

    /// Resolved value: raw for registers, decoded for fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Unresolved`] for nodes whose register has no value
    /// and [`ValueError::NotReadable`] for blocks.
    pub fn value(&self) -> Result<u64, ValueError> {
        match self.id {
            NodeId::Block(id) => Err(ValueError::NotReadable {
                block: self.map.block(id).name().to_string(),
            }),
            NodeId::Register(id) => self.map.register(id).value(),
            NodeId::Field(id) => self.map.field_value(id),
        }
    }

    /// Expected value, if this node is checked. Blocks are never checked.
    #[must_use]
    pub fn good(&self) -> Option<u64> {
        match self.id {
            NodeId::Block(_) => None,
            NodeId::Register(id) => self.map.register(id).good(),
            NodeId::Field(id) => self.map.field(id).good(),
        }
    }

    /// Whether this node or anything beneath it is anomalous.
    #[must_use]
    pub fn is_bad(&self) -> bool {
        match self.id {
            NodeId::Block(id) => self.map.block_is_bad(id),
            NodeId::Register(id) => self.map.register_is_bad(id),
            NodeId::Field(id) => self.map.field_is_bad(id),
        }
    }

    /// Whether the value backing this node is known. A block is resolved when
    /// everything beneath it is.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match self.id {
            NodeId::Block(_) => self.children().iter().all(Self::is_resolved),
            NodeId::Register(id) => self.map.register(id).is_resolved(),
            NodeId::Field(id) => self.map.register(self.map.field(id).register()).is_resolved(),
        }
    }

    /// Read failure message of the backing register, if its last read failed.
    #[must_use]
    pub fn failure(&self) -> Option<&'a str> {
        let register = match self.id {
            NodeId::Block(_) => return None,
            NodeId::Register(id) => self.map.register(id),
            NodeId::Field(id) => self.map.register(self.map.field(id).register()),
        };
        match register.state() {
            ReadState::Failed(message) => Some(message.as_str()),
            ReadState::Pending | ReadState::Resolved(_) => None,
        }
    }

    /// Children in declared order: a block's registers then its nested blocks,
    /// a register's fields, nothing for a field.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        match self.id {
            NodeId::Block(id) => {
                let block = self.map.block(id);
                block
                    .registers()
                    .iter()
                    .map(|&reg| NodeId::Register(reg))
                    .chain(block.blocks().iter().map(|&child| NodeId::Block(child)))
                    .map(|child| Self::new(self.map, child))
                    .collect()
            }
            NodeId::Register(id) => self
                .map
                .register(id)
                .fields()
                .iter()
                .map(|&field| Self::new(self.map, NodeId::Field(field)))
                .collect(),
            NodeId::Field(_) => Vec::new(),
        }
    }

    /// Slash-separated path from the root.
    #[must_use]
    pub fn path(&self) -> String {
        self.map.path(self.id)
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}

/// Renders a register address in its fixed hexadecimal form.
#[must_use]
pub fn format_address(address: u64) -> String {
    format!("0x{address:016X}")
}

/// Depth-first pre-order walk yielding `(depth, node)` in declared order.
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<(usize, Node<'a>)>,
}

impl<'a> Walk<'a> {
    /// Starts a walk at `start`, which is yielded at depth 0.
    #[must_use]
    pub fn new(start: Node<'a>) -> Self {
        Self {
            stack: vec![(0, start)],
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, Node<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children().into_iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldLayout, FieldSpec, RegisterSpec};

    fn sample() -> RegisterMap {
        let mut map = RegisterMap::new("top", "device");
        let root = map.root();
        let ctrl = map.add_register(root, RegisterSpec::new("CTRL", 0x1000).good(0x2))
            .unwrap();
        map.add_field(ctrl, FieldSpec::new("MODE", FieldLayout::Bits(vec![1, 0])))
            .unwrap();
        map.add_field(ctrl, FieldSpec::new("LOW", FieldLayout::Width(4)))
            .unwrap();
        let sub = map.add_block(root, "sub", "nested");
        map.add_register(sub, RegisterSpec::new("ID", 0x2000))
            .unwrap();
        map
    }

    #[test]
    fn walk_visits_in_declared_order_with_depth() {
        let map = sample();
        let visited: Vec<_> = map.walk()
            .map(|(depth, node)| (depth, node.name().to_string()))
            .collect();

        assert_eq!(
            visited,
            [
                (0, "top".to_string()),
                (1, "CTRL".to_string()),
                (2, "MODE".to_string()),
                (2, "LOW".to_string()),
                (1, "sub".to_string()),
                (2, "ID".to_string()),
            ]
        );
    }

    #[test]
    fn addresses_by_kind() {
        let map = sample();
        let root = map.root_node();
        assert_eq!(root.address(), None);

        let ctrl = root.children()[0];
        assert_eq!(ctrl.address().as_deref(), Some("0x0000000000001000"));

        let fields = ctrl.children();
        assert_eq!(fields[0].address().as_deref(), Some("0x0000000000001000[1,0]"));
        assert_eq!(fields[1].address().as_deref(), Some("0x0000000000001000[3:0]"));
    }

    #[test]
    fn values_through_the_uniform_contract() {
        let mut map = sample();
        let ctrl = map.registers_in_order()[0];
        map.set_state(ctrl, ReadState::Resolved(0b10));

        let root = map.root_node();
        assert!(matches!(root.value(), Err(ValueError::NotReadable { .. })));

        let ctrl = root.children()[0];
        assert_eq!(ctrl.value(), Ok(0b10));
        assert!(!ctrl.is_bad());

        let mode = ctrl.children()[0];
        assert_eq!(mode.value(), Ok(1));
        assert_eq!(mode.kind(), NodeKind::Field);
        assert!(mode.is_resolved());

        assert!(!root.is_resolved());
    }

    #[test]
    fn failure_message_reaches_fields() {
        let mut map = sample();
        let ctrl = map.registers_in_order()[0];
        map.set_state(ctrl, ReadState::Failed("bus error".into()));

        let ctrl = map.root_node().children()[0];
        assert_eq!(ctrl.failure(), Some("bus error"));
        assert_eq!(ctrl.children()[1].failure(), Some("bus error"));
        assert!(ctrl.is_bad());
    }
}

//! Text rendering of a probed register map.
//!
//! Lines follow declared order, indented by depth. Each starts with a status
//! tag: `[ ok ]` resolved and good, `[BAD ]` resolved and anomalous, `[ ?? ]`
//! no value available. A block is tagged `[BAD ]` as soon as anything beneath
//! it is anomalous, even if parts of it are also unresolved.

use std::fmt;

use crate::model::{Node, NodeKind, RegisterMap};

/// Rendering switches for [`report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportOptions {
    /// Only list nodes that are anomalous or unresolved, plus their ancestors.
    pub anomalies_only: bool,
}

/// Status shown in front of each report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Resolved and matching every check.
    Ok,
    /// Anomalous.
    Bad,
    /// No value available.
    Unresolved,
}

impl Status {
    /// Classifies a node.
    #[must_use]
    pub fn of(node: &Node<'_>) -> Self {
        match node.kind() {
            NodeKind::Block if node.is_bad() => Self::Bad,
            _ if !node.is_resolved() => Self::Unresolved,
            _ if node.is_bad() => Self::Bad,
            _ => Self::Ok,
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Ok => "[ ok ]",
            Self::Bad => "[BAD ]",
            Self::Unresolved => "[ ?? ]",
        }
    }
}

/// Per-register tally printed at the end of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSummary {
    /// Registers in the map.
    pub registers: usize,
    /// Resolved and good.
    pub ok: usize,
    /// Resolved and anomalous.
    pub bad: usize,
    /// Without a value.
    pub unresolved: usize,
}

impl ReportSummary {
    /// Whether every register was read and none is anomalous.
    #[must_use]
    pub const fn all_good(&self) -> bool {
        self.bad == 0 && self.unresolved == 0
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} registers: {} ok, {} bad, {} unresolved",
            self.registers, self.ok, self.bad, self.unresolved
        )
    }
}

/// Counts registers by status.
#[must_use]
pub fn summarize(map: &RegisterMap) -> ReportSummary {
    map.registers_in_order()
        .into_iter()
        .fold(ReportSummary::default(), |mut summary, id| {
            summary.registers += 1;
            let register = map.register(id);
            if !register.is_resolved() {
                summary.unresolved += 1;
            } else if map.register_is_bad(id) {
                summary.bad += 1;
            } else {
                summary.ok += 1;
            }
            summary
        })
}

/// Renders `map` as a plain-text report ending in a summary line.
#[must_use]
pub fn report(map: &RegisterMap, options: &ReportOptions) -> String {
    let mut lines: Vec<String> = map.walk()
        .filter(|(_, node)| !options.anomalies_only || is_anomalous(node))
        .map(|(depth, node)| Line { depth, node }.to_string())
        .collect();
    lines.push(summarize(map).to_string());

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

// Anomalies propagate upward, so filtering the walk keeps every ancestor.
fn is_anomalous(node: &Node<'_>) -> bool {
    node.is_bad() || !node.is_resolved()
}

struct Line<'a> {
    depth: usize,
    node: Node<'a>,
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.node;
        write!(f, "{}{}", "  ".repeat(self.depth), Status::of(node).tag())?;
        if let Some(address) = node.address() {
            write!(f, " {address}")?;
        }
        write!(f, " {}", node.name())?;

        if node.kind() != NodeKind::Block {
            match node.value() {
                Ok(value) => write!(f, " = 0x{value:X}")?,
                Err(_) => write!(f, " = ?")?,
            }
            if let Some(good) = node.good() {
                write!(f, " (good 0x{good:X})")?;
            }
        }

        if !node.description().is_empty() {
            write!(f, "  {}", node.description())?;
        }

        if node.kind() == NodeKind::Register {
            if let Some(message) = node.failure() {
                write!(f, "  [read failed: {message}]")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldLayout, FieldSpec, ReadState, RegisterSpec};

    fn probed() -> RegisterMap {
        let mut map = RegisterMap::new("top", "test device");
        let root = map.root();
        let ctrl = map.add_register(root, RegisterSpec::new("CTRL", 0x1000).good(0x5))
            .unwrap();
        map.add_field(ctrl, FieldSpec::new("EN", FieldLayout::Width(1)).good(1))
            .unwrap();
        let status = map.add_register(root, RegisterSpec::new("STATUS", 0x1004))
            .unwrap();
        let link = map.add_block(root, "link", "");
        let id = map.add_register(link, RegisterSpec::new("ID", 0x2000))
            .unwrap();

        map.set_state(ctrl, ReadState::Resolved(0x7));
        map.set_state(status, ReadState::Failed("bus timeout".into()));
        map.set_state(id, ReadState::Resolved(0x42));
        map
    }

    #[test]
    fn full_report_lists_every_node_in_declared_order() {
        let text = report(&probed(), &ReportOptions::default());
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines,
            [
                "[BAD ] top  test device",
                "  [BAD ] 0x0000000000001000 CTRL = 0x7 (good 0x5)",
                "    [ ok ] 0x0000000000001000[0] EN = 0x1 (good 0x1)",
                "  [ ?? ] 0x0000000000001004 STATUS = ?  [read failed: bus timeout]",
                "  [ ok ] link",
                "    [ ok ] 0x0000000000002000 ID = 0x42",
                "3 registers: 1 ok, 1 bad, 1 unresolved",
            ]
        );
    }

    #[test]
    fn anomalies_only_keeps_bad_and_unresolved_paths() {
        let text = report(
            &probed(),
            &ReportOptions {
                anomalies_only: true,
            },
        );

        assert!(text.contains("CTRL"));
        assert!(text.contains("STATUS"));
        assert!(!text.contains("EN"));
        assert!(!text.contains("link"));
        assert!(!text.contains(" ID "));
        assert!(text.ends_with("3 registers: 1 ok, 1 bad, 1 unresolved\n"));
    }

    #[test]
    fn unprobed_map_is_all_unresolved() {
        let mut map = probed();
        map.clear_values();

        let summary = summarize(&map);
        assert_eq!(summary.unresolved, 3);
        assert!(!summary.all_good());

        let text = report(&map, &ReportOptions::default());
        assert!(text.contains("[ ?? ] 0x0000000000002000 ID = ?"));
    }

    #[test]
    fn clean_map_has_only_a_summary_in_anomaly_mode() {
        let mut map = RegisterMap::new("top", "");
        let root = map.root();
        let reg = map.add_register(root, RegisterSpec::new("ID", 0x0).good(1))
            .unwrap();
        map.set_state(reg, ReadState::Resolved(1));

        let text = report(
            &map,
            &ReportOptions {
                anomalies_only: true,
            },
        );
        assert_eq!(text, "1 registers: 1 ok, 0 bad, 0 unresolved\n");
        assert!(summarize(&map).all_good());
    }
}

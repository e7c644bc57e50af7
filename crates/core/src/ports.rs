// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Port type system (spec §3): typed data ports plus the two reserved
//! control-flow port names that never carry a data value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type carried by a data port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortType {
    Any,
    Boolean,
    Integer,
    Float,
    String,
    List,
    Dict,
    DateTime,
    Bytes,
    NodeReference,
}

impl PortType {
    /// Structural compatibility check for connecting `self` (target) to a
    /// `source` port, per spec §3: `ANY` accepts anything; otherwise the
    /// types must match, with `INTEGER -> FLOAT` widening permitted.
    pub fn accepts(&self, source: PortType) -> bool {
        match (self, source) {
            (PortType::Any, _) => true,
            (a, b) if *a == b => true,
            (PortType::Float, PortType::Integer) => true,
            _ => false,
        }
    }
}

crate::simple_display! {
    PortType {
        Any => "ANY",
        Boolean => "BOOLEAN",
        Integer => "INTEGER",
        Float => "FLOAT",
        String => "STRING",
        List => "LIST",
        Dict => "DICT",
        DateTime => "DATETIME",
        Bytes => "BYTES",
        NodeReference => "NODE_REFERENCE",
    }
}

/// The two reserved control-flow port names. Control ports never appear in
/// data-flow edges and carry no value.
pub const EXEC_IN: &str = "exec_in";
pub const EXEC_OUT: &str = "exec_out";

/// A port name, distinguishing control ports (`exec_in`, `exec_out`, and any
/// other `exec_*` branch/scope port such as `"true"`/`"body"`/`"catch"`)
/// from data ports by convention: exactly `exec_in`/`exec_out` are the two
/// reserved control endpoints; branch/scope nodes declare additional
/// control-typed output ports (e.g. `"true"`, `"false"`) that are marked
/// explicitly via [`PortDecl::control`] rather than by name matching, since
/// their names are not reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortName(pub String);

impl PortName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the two reserved control-flow connector names.
    pub fn is_reserved_control(&self) -> bool {
        self.0 == EXEC_IN || self.0 == EXEC_OUT
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PortName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Whether a port carries control flow or a typed data value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlFlow {
    Control,
    Data(PortType),
}

impl ControlFlow {
    pub fn is_control(&self) -> bool {
        matches!(self, ControlFlow::Control)
    }

    pub fn data_type(&self) -> Option<PortType> {
        match self {
            ControlFlow::Data(t) => Some(*t),
            ControlFlow::Control => None,
        }
    }
}

/// A declared port on a node: its name and whether it's control or typed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: PortName,
    pub flow: ControlFlow,
}

impl PortDecl {
    pub fn control(name: impl Into<String>) -> Self {
        Self { name: PortName::new(name), flow: ControlFlow::Control }
    }

    pub fn data(name: impl Into<String>, port_type: PortType) -> Self {
        Self { name: PortName::new(name), flow: ControlFlow::Data(port_type) }
    }

    pub fn exec_in() -> Self {
        Self::control(EXEC_IN)
    }

    pub fn exec_out() -> Self {
        Self::control(EXEC_OUT)
    }
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Portal roles.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Roles recognized by the portal.
///
/// The set is closed: every identity record carries exactly one of these,
/// and downstream feature authorization consumes the resolved role as-is.
///
/// ## Categories
///
/// - `Admin` - portal administrators (own identity store)
/// - `Teacher` - teaching staff (own identity store)
/// - `Student` - learners (own identity store)
/// - `Parent` - family accounts (own identity store)
/// - Everything else - non-teaching staff positions, all persisted in the
///   shared staff store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Teaching staff
    Teacher,
    /// Learner account
    Student,
    /// Family account
    Parent,
    /// School principal
    Principal,
    /// Vice principal
    VicePrincipal,
    /// Enrollment and records office
    Registrar,
    /// Finance office
    Accountant,
    /// Student counseling
    Counselor,
    /// Library staff
    Librarian,
    /// Medical office
    Nurse,
    /// Front desk
    Receptionist,
}

impl Role {
    /// Parse a role from its stored string form (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            "parent" => Some(Role::Parent),
            "principal" => Some(Role::Principal),
            "vice_principal" => Some(Role::VicePrincipal),
            "registrar" => Some(Role::Registrar),
            "accountant" => Some(Role::Accountant),
            "counselor" => Some(Role::Counselor),
            "librarian" => Some(Role::Librarian),
            "nurse" => Some(Role::Nurse),
            "receptionist" => Some(Role::Receptionist),
            _ => None,
        }
    }

    /// Stored string form of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Principal => "principal",
            Role::VicePrincipal => "vice_principal",
            Role::Registrar => "registrar",
            Role::Accountant => "accountant",
            Role::Counselor => "counselor",
            Role::Librarian => "librarian",
            Role::Nurse => "nurse",
            Role::Receptionist => "receptionist",
        }
    }

    /// Whether this role is a non-teaching staff position (shared staff store).
    pub fn is_staff_position(&self) -> bool {
        !matches!(
            self,
            Role::Admin | Role::Teacher | Role::Student | Role::Parent
        )
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

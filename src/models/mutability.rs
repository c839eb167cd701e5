//! Which fields may change on update, as one table per entity.
//!
//! [`validate_transition`] is consulted before any remote call of an update,
//! so a violation never reaches the gateway.

use crate::{
    errors::ImmutableFieldError,
    models::{bucket::Bucket, user::User},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    /// Must equal the tracked value.
    Immutable,
    /// Must equal the tracked value whenever the desired value is declared;
    /// an undeclared value inherits the tracked one.
    ImmutableWhenDeclared,
}

pub struct FieldPolicy<T> {
    pub field: &'static str,
    pub mutability: Mutability,
    pub value: fn(&T) -> Option<String>,
}

pub const BUCKET_FIELDS: &[FieldPolicy<Bucket>] = &[
    FieldPolicy {
        field: "name",
        mutability: Mutability::Immutable,
        value: |b| Some(b.name.clone()),
    },
    FieldPolicy {
        field: "placement_rule",
        mutability: Mutability::ImmutableWhenDeclared,
        value: |b| b.placement_rule.clone(),
    },
    FieldPolicy {
        field: "owner",
        mutability: Mutability::ImmutableWhenDeclared,
        value: |b| b.owner.clone(),
    },
    FieldPolicy {
        field: "versioning_enabled",
        mutability: Mutability::Mutable,
        value: |b| Some(b.versioning_enabled.to_string()),
    },
    FieldPolicy {
        field: "permission",
        mutability: Mutability::Mutable,
        value: |b| Some(format!("{:?}", b.permissions)),
    },
    FieldPolicy {
        field: "lifecycle_delete",
        mutability: Mutability::Mutable,
        value: |b| Some(format!("{:?}", b.lifecycle_delete)),
    },
    FieldPolicy {
        field: "lifecycle_delete_noncurrent",
        mutability: Mutability::Mutable,
        value: |b| Some(format!("{:?}", b.lifecycle_delete_noncurrent)),
    },
];

pub const USER_FIELDS: &[FieldPolicy<User>] = &[
    FieldPolicy {
        field: "id",
        mutability: Mutability::Immutable,
        value: |u| Some(u.id.clone()),
    },
    FieldPolicy {
        field: "name",
        mutability: Mutability::Mutable,
        value: |u| u.name.clone(),
    },
    FieldPolicy {
        field: "max_buckets",
        mutability: Mutability::Mutable,
        value: |u| u.max_buckets.map(|m| m.to_string()),
    },
    FieldPolicy {
        field: "access_key",
        mutability: Mutability::Mutable,
        value: |u| u.access_key.clone(),
    },
    FieldPolicy {
        field: "secret_key",
        mutability: Mutability::Mutable,
        value: |u| u.secret_key.clone(),
    },
];

/// Check a `state -> desired` transition against a field table.
///
/// Fields are checked in table order and the first violation is returned.
pub fn validate_transition<T>(
    entity: &'static str,
    policies: &[FieldPolicy<T>],
    state: &T,
    desired: &T,
) -> Result<(), ImmutableFieldError> {
    for policy in policies {
        let to = (policy.value)(desired);
        let checked = match policy.mutability {
            Mutability::Mutable => false,
            Mutability::Immutable => true,
            Mutability::ImmutableWhenDeclared => to.is_some(),
        };
        if !checked {
            continue;
        }

        let from = (policy.value)(state);
        if from != to {
            return Err(ImmutableFieldError {
                entity,
                field: policy.field,
                from,
                to,
            });
        }
    }

    Ok(())
}

/// Names of the fields that differ between two values, in table order.
pub fn changed_fields<T>(policies: &[FieldPolicy<T>], current: &T, desired: &T) -> Vec<&'static str> {
    policies
        .iter()
        .filter(|policy| (policy.value)(current) != (policy.value)(desired))
        .map(|policy| policy.field)
        .collect()
}

//! Role model and image naming for role image builds.
//!
//! A *role* is one independently buildable unit of a distributed application,
//! destined for exactly one container image. It bundles one or more *jobs*
//! (templates, a supervision descriptor and compiled packages) drawn from a
//! release.
//!
//! This crate provides:
//! - The data model handed to the image pipeline ([`Role`], [`Job`], [`Package`],
//!   [`Release`], [`RunConfig`])
//! - The explicit simple/composite predicate ([`Role::kind`], [`RoleKind`])
//! - Loading of an already-resolved role list from YAML ([`load_roles`])
//! - Deterministic image and directory naming ([`naming`])
//!
//! # Example
//!
//! ```
//! use convenient_role::naming::{base_image_name, role_image_name};
//!
//! assert_eq!(role_image_name("acme", "router", "1.2.3"), "acme-router:1.2.3");
//! assert_eq!(base_image_name("acme", "6.28.30"), "acme-role-base:6.28.30");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod model;
pub mod naming;

pub use model::{
    FlightStage, Job, JobTemplate, ModelError, ModelResult, Package, PortSpec, Release, Role,
    RoleKind, RoleList, RunConfig, Scaling, Volume, load_roles,
};
pub use naming::NamingError;

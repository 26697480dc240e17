// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stead-cluster: distributed registry, placement migration, and the
//! cluster-singleton poller guard
//!
//! The cluster directory is the atomic primitive everything here builds on:
//! name registration decides placement races, membership events drive
//! migration and poller failover. One topology value selects local or
//! distributed wiring; nothing above this crate branches on the mode.

mod directory;
mod migrate;
mod registry;
mod singleton;
mod topology;

pub use directory::{Cluster, MembershipEvent, NameClaim, NodeId};
pub use registry::DistributedRegistry;
pub use topology::{ClusterMembers, Node, NodeBuilder, Topology};

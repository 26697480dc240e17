//! Workspace-level end-to-end specs for the stead runtime.
//!
//! These exercise the public surface the way an embedding application
//! would: file-backed databases, process "restarts" modeled as fresh
//! runtimes over the same file, and multi-node clusters in one process.

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/alarms"]
mod alarms {
    mod recovery;
    mod recurring;
}

#[path = "specs/cluster"]
mod cluster {
    mod migration;
}

#[path = "specs/entity"]
mod entity {
    mod compat;
    mod counter;
    mod rollback;
}

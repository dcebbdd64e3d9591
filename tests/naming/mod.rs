//! Id uniqueness tests over indexed workspaces.

pub mod tests_next_id;

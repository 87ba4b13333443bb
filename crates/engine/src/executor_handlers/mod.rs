pub(crate) mod calls;
pub(crate) mod control_flow;
pub(crate) mod loops;
pub(crate) mod output;
pub(crate) mod variables;

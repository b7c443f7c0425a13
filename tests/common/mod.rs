pub(crate) mod cluster;

pub(crate) mod logging;

pub(crate) mod network;

pub(crate) mod node;

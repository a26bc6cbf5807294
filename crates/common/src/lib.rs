// adminprobe-common: admin protocol codec shared by the harness and its tests

pub mod path;
pub mod protocol;

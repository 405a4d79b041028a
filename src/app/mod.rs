pub mod ports;
pub mod collect_use_case;

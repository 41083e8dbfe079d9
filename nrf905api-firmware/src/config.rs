//! Board configuration generated from board.toml

include!(concat!(env!("OUT_DIR"), "/board_config.rs"));

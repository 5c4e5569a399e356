pub mod string_util;

pub use string_util::{StripCodeBlock, humanize_identifier, parse_json_content, truncate_chars};

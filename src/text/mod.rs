pub mod normalize;

pub use normalize::{detect_line_ending, normalize_eol, strip_all_boms, LineEnding};

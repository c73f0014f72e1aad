pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, ident, info, section, success, summary_row};
pub use progress::Spinner;
pub use table::{rows_table, stats_table};
pub use theme::theme;

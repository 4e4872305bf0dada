pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    backend_section, decision, dim, error, file_new, header, info, status, success,
};
pub use progress::ProgressManager;
pub use progress_message::ProgressMessage;
pub use table::{TableBuilder, backend_table};
pub use theme::{DecisionKind, Theme, theme};

mod bullet_points;
mod prompt;
mod table;

pub use bullet_points::{BulletPointPrinter, LineWriter, StdoutLineWriter};
pub use prompt::prompt;
pub use table::format_transaction_table;

#[cfg(test)]
pub use bullet_points::testutils;

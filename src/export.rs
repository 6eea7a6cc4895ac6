use std::io::Write;

use crate::models::Transaction;

const HEADER: [&str; 5] = ["id", "date", "description", "type", "amount"];

/// Write the ledger as CSV, in the order given. Returns the row count.
pub(crate) fn write_csv<W: Write>(transactions: &[Transaction], out: W) -> csv::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;
    for txn in transactions {
        writer.write_record([
            txn.id.as_str(),
            &txn.date.format("%Y-%m-%d").to_string(),
            &txn.description,
            txn.kind.as_str(),
            &txn.amount.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(transactions.len())
}

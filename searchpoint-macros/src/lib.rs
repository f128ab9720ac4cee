use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod parsed;

use parsed::ParsedRecord;

/// Derive `searchpoint::record::Record` for a struct with named fields.
///
/// Every field is readable under its own name unless marked `#[record(skip)]` or renamed
/// with `#[record(rename = "...")]`. Struct-level `#[record(computed = "method")]` exposes
/// the return value of `self.method()` under the method's name.
///
/// ```text
/// #[derive(Serialize, Record)]
/// #[record(computed = "display_name")]
/// struct Article {
///     id: u64,
///     title: String,
///     #[record(skip)]
///     body: String,
/// }
///
/// impl Article {
///     fn display_name(&self) -> String {
///         format!("{} {}", self.id, self.title)
///     }
/// }
/// ```
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match ParsedRecord::from_input(&input) {
        Ok(parsed) => parsed.emit().into(),
        Err(err) => err.to_compile_error().into(),
    }
}

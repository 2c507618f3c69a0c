use crate::registry::builtin_catalog;

pub fn render() -> String {
    let catalog = builtin_catalog();
    let width = catalog
        .iter()
        .map(|(base, _)| format!("{base:?}").len())
        .max()
        .unwrap_or(0);

    let mut out = String::from("Built-in strategies:\n");
    for (base, description) in catalog {
        out.push_str(&format!("  {:<width$}  {}\n", format!("{base:?}"), description));
    }
    out
}

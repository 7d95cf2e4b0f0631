use spole_core::model::{AuxTable, Extraction, FieldValue};
use spole_core::rules::schema::{CoreField, DocumentField, TankField, WindingField};

pub fn print(extraction: &Extraction) {
    let doc = &extraction.document;
    let count = extraction.winding_count;

    println!("=== Windings ({count}) ===\n");
    let names = &extraction.winding_names[..count];
    print!("  {:<18}", "Field");
    for name in names {
        print!("  {:>12}", name);
    }
    println!();
    println!("  {}", "-".repeat(18 + names.len() * 14));

    for field in WindingField::ALL {
        let values: Vec<FieldValue> = doc.windings[..count]
            .iter()
            .map(|w| w.get(*field))
            .collect();
        if values.iter().all(FieldValue::is_null) {
            continue;
        }
        print!("  {:<18}", field.as_str());
        for v in &values {
            print!("  {:>12}", v.to_string());
        }
        println!();
    }
    println!();

    let core: Vec<(&str, FieldValue)> = CoreField::ALL
        .iter()
        .map(|f| (f.as_str(), doc.core.get(*f)))
        .collect();
    print_section("Core", &core);

    let tank: Vec<(&str, FieldValue)> = TankField::ALL
        .iter()
        .map(|f| (f.as_str(), doc.tank.get(*f)))
        .collect();
    print_section("Tank", &tank);

    let summary: Vec<(&str, FieldValue)> = DocumentField::ALL
        .iter()
        .map(|f| (f.as_str(), doc.summary.get(*f)))
        .collect();
    print_section("Design", &summary);

    for table in &doc.tube_tables {
        print_table(table);
    }
    if let Some(ref table) = doc.core_table {
        print_table(table);
    }

    if !extraction.trace.warnings.is_empty() {
        println!("Warnings:");
        for w in &extraction.trace.warnings {
            match w.page_number {
                Some(p) => println!("  - page {}: {}", p, w.message),
                None => println!("  - {}", w.message),
            }
        }
        println!();
    }
}

fn print_section(title: &str, fields: &[(&str, FieldValue)]) {
    let present: Vec<_> = fields.iter().filter(|(_, v)| !v.is_null()).collect();
    if present.is_empty() {
        return;
    }
    println!("=== {title} ===\n");
    for (name, value) in present {
        println!("  {:<18}  {}", name, value);
    }
    println!();
}

fn print_table(table: &AuxTable) {
    println!("=== {} ({}) ===\n", table.title, table.kind);

    let widths: Vec<usize> = (0..table.columns.len())
        .map(|i| {
            table
                .rows
                .iter()
                .filter_map(|r| r.cells.get(i))
                .map(|c| c.len())
                .chain(std::iter::once(table.columns[i].len()))
                .max()
                .unwrap_or(4)
        })
        .collect();

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    println!("  {}", header.join("  "));

    for row in &table.rows {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = row.cells.get(i).map(String::as_str).unwrap_or("");
                format!("{:<w$}", cell, w = *w)
            })
            .collect();
        let marker = if row.is_total {
            "  (total)"
        } else if row.is_duct {
            "  (duct)"
        } else {
            ""
        };
        println!("  {}{}", cells.join("  "), marker);
    }
    println!();
}

//! Name normalisation for tree nodes and storage tables.

/// `SimpleFlat` → `simple_flat`; `HTTPServer` → `http_server`.
pub fn snake_case(name: &str) -> String {
  let chars: Vec<char> = name.chars().collect();
  let mut out = String::with_capacity(name.len() + 4);

  for (i, &c) in chars.iter().enumerate() {
    if c.is_uppercase() {
      let prev = i.checked_sub(1).map(|p| chars[p]);
      let next = chars.get(i + 1).copied();
      let boundary = match prev {
        Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
        Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
        _ => false,
      };
      if boundary && !out.ends_with('_') {
        out.push('_');
      }
      out.extend(c.to_lowercase());
    } else {
      out.push(c);
    }
  }

  out
}

/// English plural of a snake_case word, covering the regular suffix rules.
pub fn pluralize(word: &str) -> String {
  const SIBILANTS: [&str; 5] = ["s", "x", "z", "ch", "sh"];

  if SIBILANTS.iter().any(|s| word.ends_with(s)) {
    return format!("{word}es");
  }
  if let Some(stem) = word.strip_suffix('y')
    && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
    && !stem.is_empty()
  {
    return format!("{stem}ies");
  }
  format!("{word}s")
}

/// Storage table name for a declared type name.
pub fn table_name(type_name: &str) -> String { pluralize(&snake_case(type_name)) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snake_cases_type_names() {
    assert_eq!(snake_case("Dragon"), "dragon");
    assert_eq!(snake_case("SimpleFlat"), "simple_flat");
    assert_eq!(snake_case("AggregateWithOptionalNested"), "aggregate_with_optional_nested");
    assert_eq!(snake_case("HTTPServer"), "http_server");
  }

  #[test]
  fn pluralizes_table_names() {
    assert_eq!(table_name("Plan"), "plans");
    assert_eq!(table_name("Subscriber"), "subscribers");
    assert_eq!(table_name("Category"), "categories");
    assert_eq!(table_name("Survey"), "surveys");
    assert_eq!(table_name("TaxBox"), "tax_boxes");
    assert_eq!(table_name("Branch"), "branches");
  }
}

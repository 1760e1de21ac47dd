/*!
  Symbol tables for labels and global variables.

  A symbol is defined once it has a value, and may be referenced any number of times before or
  after that. Each reference remembers the image offset of the word that must receive the
  symbol's value along with the source position it came from. Once the whole source has been
  read, `patch` writes every defined value into the image and reports the earliest reference
  to a symbol that never got one.
*/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use prettytable::Table;
use string_cache::DefaultAtom;

use crate::bytecode::{Scalar, Word};
use crate::display::TABLE_DISPLAY_FORMAT;

/// Where a symbol's value must be written, and where in the source the reference came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Reference {
  pub offset : usize,
  pub line   : usize,
  pub column : usize,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Symbol {
  pub value      : Option<Word>,
  pub references : Vec<Reference>,
}

/// A reference to a symbol that was never defined.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Unresolved {
  pub name      : DefaultAtom,
  pub reference : Reference,
}

pub struct SymbolTable {
  /// The character that introduces a name of this table in assembly, `@` or `%`.
  sigil : char,
  table : HashMap<DefaultAtom, Symbol>,
}

impl SymbolTable {

  pub fn new(sigil: char) -> SymbolTable {
    SymbolTable {
      sigil,
      table: HashMap::new()
    }
  }

  pub fn get(&self, name: &str) -> Option<&Symbol> {
    self.table.get(&DefaultAtom::from(name))
  }

  /// Gives `name` its value. Fails with the existing value if it was already defined.
  pub fn define(&mut self, name: &str, value: Word) -> Result<(), Word> {
    let symbol = self.table.entry(DefaultAtom::from(name)).or_default();
    match symbol.value {
      Some(existing) => Err(existing),
      None           => {
        symbol.value = Some(value);
        Ok(())
      }
    }
  }

  pub fn reference(&mut self, name: &str, reference: Reference) {
    self.table
        .entry(DefaultAtom::from(name))
        .or_default()
        .references
        .push(reference);
  }

  /**
    Writes the value of every defined symbol over each of its references in `image`. On
    success returns the number of words patched. If any symbol is undefined, nothing is
    written and the earliest reference, by source position, to an undefined symbol is
    returned.
  */
  pub fn patch(&self, image: &mut [u8]) -> Result<usize, Unresolved> {
    let earliest_undefined =
      self.table
          .iter()
          .filter(|(_, symbol)| symbol.value.is_none())
          .flat_map(|(name, symbol)| symbol.references.iter().map(move |r| (name, r)))
          .min_by_key(|(_, r)| (r.line, r.column));

    if let Some((name, reference)) = earliest_undefined {
      return Err(Unresolved { name: name.clone(), reference: *reference });
    }

    let mut patched = 0;
    for symbol in self.table.values() {
      if let Some(value) = symbol.value {
        for reference in symbol.references.iter() {
          value.encode(&mut image[reference.offset..reference.offset + Word::WIDTH]);
          patched += 1;
        }
      }
    }
    Ok(patched)
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}

impl Display for SymbolTable {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut entries: Vec<(&DefaultAtom, &Symbol)> = self.table.iter().collect();
    entries.sort_by(|(a, _), (b, _)| str::cmp(a, b));

    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Symbol", ubl->"Value", ubl->"Referenced at"]);

    for (name, symbol) in entries {
      let value  = match symbol.value {
        Some(value) => format!("{:#010x}", value),
        None        => "undefined".to_string()
      };
      let references = symbol.references
                             .iter()
                             .map(|r| format!("{}:{}", r.line, r.column))
                             .collect::<Vec<String>>()
                             .join(" ");
      table.add_row(row![r->format!("{}{}", self.sigil, name), value, references]);
    }

    write!(f, "{}", table)
  }
}

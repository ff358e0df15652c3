use std::ops::Range;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

// Symbol table of label -> byte address
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Maximum number of labels in one source file.
pub const SYMBOL_TABLE_CAPACITY: usize = 256;

/// Labels defined by the first assembler pass. Owned by a single assembly.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    map: FxMap<String, u16>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InsertError {
    Duplicate,
    Full,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Define `label` at `addr`. Labels may only be defined once.
    pub fn insert(&mut self, label: &str, addr: u16) -> Result<(), InsertError> {
        if self.map.contains_key(label) {
            return Err(InsertError::Duplicate);
        }
        if self.map.len() >= SYMBOL_TABLE_CAPACITY {
            return Err(InsertError::Full);
        }
        self.map.insert(label.to_string(), addr);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<u16> {
        self.map.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Labels in order of definition.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.map.iter().map(|(label, addr)| (label.as_str(), *addr))
    }
}

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn range(&self) -> Range<usize> {
        self.offs.0..self.offs.0 + self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.range()
    }
}

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct SrcOffset(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut table = SymbolTable::new();
        table.insert("START", 0).unwrap();
        table.insert("SKIP", 12).unwrap();
        assert_eq!(table.get("SKIP"), Some(12));
        assert_eq!(table.get("skip"), None);
        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            vec![("START", 0), ("SKIP", 12)]
        );
    }

    #[test]
    fn redefinition_is_rejected() {
        let mut table = SymbolTable::new();
        table.insert("LOOP", 4).unwrap();
        assert_eq!(table.insert("LOOP", 8), Err(InsertError::Duplicate));
        assert_eq!(table.get("LOOP"), Some(4));
    }

    #[test]
    fn capacity() {
        let mut table = SymbolTable::new();
        for i in 0..SYMBOL_TABLE_CAPACITY {
            table.insert(&format!("L{i}"), i as u16).unwrap();
        }
        assert_eq!(table.insert("ONE_MORE", 0), Err(InsertError::Full));
        assert_eq!(table.len(), SYMBOL_TABLE_CAPACITY);
    }

    #[test]
    fn span_conversion() {
        let span = Span::new(SrcOffset(4), 3);
        assert_eq!(span.range(), 4..7);
        assert_eq!(SourceSpan::from(span), SourceSpan::new(4.into(), 3));
    }
}

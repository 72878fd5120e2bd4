//! The closed set of column types, their cast groups, and assignability.
//!
//! Grounded on the teacher's `DataType`/`DataKind` encoding in `expr.rs`
//! (a packed `kind + size` integer with a `data_kind`/`data_size` pair of
//! free functions) and the cast-group table carried in `table.rs`'s
//! `AlterCol`/`add_altered`. Spec.md section 3 fixes twelve (thirteen
//! counting LONG256) wire-level types rather than the teacher's
//! size-parameterised `INT`/`STRING`, so this module is a flat enum
//! instead of a packed integer -- there is no variable-width STRING(n)
//! here, only the fixed closed set spec.md names.

use serde::{Deserialize, Serialize};

/// The closed set of column types (section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Date,
    Timestamp,
    String,
    Symbol,
    Binary,
    Long256,
}

impl ColumnType {
    /// Parse a type name as it appears in CREATE TABLE / CAST, case-insensitively.
    pub fn from_name(name: &str) -> Option<ColumnType> {
        use ColumnType::*;
        Some(match name.to_ascii_uppercase().as_str() {
            "BOOLEAN" => Boolean,
            "BYTE" => Byte,
            "SHORT" => Short,
            "CHAR" => Char,
            "INT" => Int,
            "LONG" => Long,
            "FLOAT" => Float,
            "DOUBLE" => Double,
            "DATE" => Date,
            "TIMESTAMP" => Timestamp,
            "STRING" => String,
            "SYMBOL" => Symbol,
            "BINARY" => Binary,
            "LONG256" => Long256,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use ColumnType::*;
        match self {
            Boolean => "BOOLEAN",
            Byte => "BYTE",
            Short => "SHORT",
            Char => "CHAR",
            Int => "INT",
            Long => "LONG",
            Float => "FLOAT",
            Double => "DOUBLE",
            Date => "DATE",
            Timestamp => "TIMESTAMP",
            String => "STRING",
            Symbol => "SYMBOL",
            Binary => "BINARY",
            Long256 => "LONG256",
        }
    }

    /// Cast group membership used for CAST compatibility in CREATE TABLE AS SELECT (section 3).
    pub fn cast_group(self) -> CastGroup {
        use ColumnType::*;
        match self {
            Byte | Short | Char | Int | Long | Float | Double | Date | Timestamp => {
                CastGroup::Numeric
            }
            Boolean => CastGroup::Boolean,
            String | Symbol => CastGroup::Text,
            Binary => CastGroup::Binary,
            Long256 => CastGroup::Long256,
        }
    }

    /// Numeric widening rank within BYTE..DOUBLE (section 3's assignability
    /// clause), used by `is_assignable_from` to decide "wider than source".
    /// CHAR is deliberately excluded: assignability only grants it
    /// CHAR->STRING (section 3), never numeric widening, even though CHAR
    /// sits in cast group 1 for CAST purposes.
    fn numeric_rank(self) -> Option<u8> {
        use ColumnType::*;
        Some(match self {
            Byte => 0,
            Short => 1,
            Int => 2,
            Date => 3,
            Long => 3,
            Timestamp => 3,
            Float => 10,
            Double => 11,
            _ => return None,
        })
    }

    fn is_integral(self) -> bool {
        use ColumnType::*;
        matches!(self, Byte | Short | Int | Long | Date | Timestamp)
    }

    fn is_floating(self) -> bool {
        matches!(self, ColumnType::Float | ColumnType::Double)
    }
}

/// Equivalence classes of column types permitting lossy/lossless CAST (section 3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastGroup {
    Numeric,
    Boolean,
    Text,
    Binary,
    Long256,
}

/// Two types are compatible for CAST iff their groups match (section 3).
pub fn cast_compatible(from: ColumnType, to: ColumnType) -> bool {
    from.cast_group() == to.cast_group()
}

/// Assignability (for INSERT) is broader than CAST compatibility: identity;
/// a wider numeric target within BYTE..DOUBLE; STRING<->SYMBOL; CHAR->STRING.
pub fn is_assignable_from(target: ColumnType, source: ColumnType) -> bool {
    use ColumnType::*;
    if target == source {
        return true;
    }
    match (target, source) {
        (String, Symbol) | (Symbol, String) | (String, Char) => true,
        _ => {
            if let (Some(tr), Some(sr)) = (target.numeric_rank(), source.numeric_rank()) {
                // Widening only: an integral source may widen into a wider
                // integral target, and any numeric source may widen into a
                // floating target of equal-or-greater rank group.
                match (target.is_floating(), source.is_floating()) {
                    (true, true) => tr >= sr,
                    (true, false) => true,
                    (false, false) => target.is_integral() && source.is_integral() && tr >= sr,
                    (false, true) => false,
                }
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ColumnType::*;

    #[test]
    fn identity_is_always_assignable() {
        for t in [
            Boolean, Byte, Short, Char, Int, Long, Float, Double, Date, Timestamp, String, Symbol,
            Binary, Long256,
        ] {
            assert!(is_assignable_from(t, t));
        }
    }

    #[test]
    fn numeric_widening_is_assignable() {
        assert!(is_assignable_from(Long, Int));
        assert!(is_assignable_from(Double, Int));
        assert!(is_assignable_from(Double, Float));
        assert!(!is_assignable_from(Int, Long));
        assert!(!is_assignable_from(Int, Double));
        assert!(!is_assignable_from(Float, Double));
    }

    #[test]
    fn string_symbol_char_assignability() {
        assert!(is_assignable_from(String, Symbol));
        assert!(is_assignable_from(Symbol, String));
        assert!(is_assignable_from(String, Char));
        assert!(!is_assignable_from(Char, String));
    }

    #[test]
    fn cast_groups_match_spec_partition() {
        for t in [Byte, Short, Char, Int, Long, Float, Double, Date, Timestamp] {
            assert_eq!(t.cast_group(), CastGroup::Numeric);
        }
        assert_eq!(Boolean.cast_group(), CastGroup::Boolean);
        assert_eq!(String.cast_group(), CastGroup::Text);
        assert_eq!(Symbol.cast_group(), CastGroup::Text);
        assert_eq!(Binary.cast_group(), CastGroup::Binary);
        assert_eq!(Long256.cast_group(), CastGroup::Long256);
    }

    #[test]
    fn cast_compatible_matches_group() {
        assert!(cast_compatible(Int, Long));
        assert!(cast_compatible(String, Symbol));
        assert!(!cast_compatible(Int, String));
        assert!(!cast_compatible(Boolean, Int));
    }

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(ColumnType::from_name("int"), Some(Int));
        assert_eq!(ColumnType::from_name("INT"), Some(Int));
        assert_eq!(ColumnType::from_name("Timestamp"), Some(Timestamp));
        assert_eq!(ColumnType::from_name("nope"), None);
    }
}

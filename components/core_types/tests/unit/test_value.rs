//! Unit tests for Value and the shared arithmetic helpers

use core_types::{ArithFault, ArithOp, ClassId, CmpOp, ObjectRef, Value};

#[cfg(test)]
mod truthiness_tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert!(Value::Int(0).is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(Value::Null.is_zero());
    }

    #[test]
    fn test_non_zero_values() {
        assert!(!Value::Int(-1).is_zero());
        assert!(!Value::Bool(true).is_zero());
        assert!(!Value::Object(ObjectRef::new(ClassId::OBJECT, 0)).is_zero());
    }

    #[test]
    fn test_default_is_null() {
        assert_eq!(Value::default(), Value::Null);
    }
}

#[cfg(test)]
mod arithmetic_tests {
    use super::*;

    #[test]
    fn test_division_truncates_toward_zero() {
        assert_eq!(
            Value::arith(ArithOp::Div, Value::Int(-7), Value::Int(2)),
            Ok(Value::Int(-3))
        );
    }

    #[test]
    fn test_min_divided_by_minus_one_wraps() {
        assert_eq!(
            Value::arith(ArithOp::Div, Value::Int(i64::MIN), Value::Int(-1)),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(Value::checked_arith(ArithOp::Div, i64::MIN, -1), Ok(None));
    }

    #[test]
    fn test_object_operand_is_not_an_integer() {
        let obj = Value::Object(ObjectRef::new(ClassId(20), 4));
        assert_eq!(
            Value::arith(ArithOp::Mul, obj, Value::Int(2)),
            Err(ArithFault::NotAnInteger)
        );
    }

    #[test]
    fn test_less_than() {
        assert_eq!(
            Value::compare(CmpOp::Lt, Value::Int(1), Value::Int(2)),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            Value::compare(CmpOp::Lt, Value::Int(2), Value::Int(2)),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn test_class_of_value() {
        let obj = Value::Object(ObjectRef::new(ClassId(17), 9));
        assert_eq!(obj.class(), Some(ClassId(17)));
        assert_eq!(Value::Int(3).class(), None);
    }
}

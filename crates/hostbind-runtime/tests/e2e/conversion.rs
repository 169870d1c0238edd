//! Value marshaling and overload resolution

use crate::harness::*;
use hostbind_sdk::{Decimal, HostArray, NumericKind};

// ============================================================================
// Overload resolution
// ============================================================================

#[test]
fn test_overload_follows_argument_kind() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(0));

    host.run(|scope| {
        let counter = scope.global("counter")?;
        let add = |arg: ScriptValue| -> ScriptResult<String> {
            Ok(text(&scope.invoke_method(&counter, "Add", &[arg])?))
        };
        assert_eq!(add(i(5))?, "Int32");
        assert_eq!(add(i(1 << 40))?, "Int64");
        assert_eq!(add(ScriptValue::number(1.5))?, "Double");
        assert_eq!(add(s("x"))?, "String");
        expect_error(scope.invoke_method(&counter, "Add", &[ScriptValue::Bool(true)]), "MissingMember");
        expect_error(scope.invoke_method(&counter, "Add", &[]), "MissingMember");
        Ok(())
    });
}

#[test]
fn test_explicit_coercion_selects_overload() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(0));

    host.run(|scope| {
        let counter = scope.global("counter")?;
        let helpers = scope.global("host")?;
        let wide = scope.invoke_method(&helpers, "toInt64", &[i(5)])?;
        assert_eq!(text(&scope.invoke_method(&counter, "Add", &[wide])?), "Int64");
        let double = scope.invoke_method(&helpers, "toDouble", &[i(2)])?;
        assert_eq!(text(&scope.invoke_method(&counter, "Add", &[double])?), "Double");
        Ok(())
    });
}

#[test]
fn test_single_candidate_reports_conversion_error() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let overloads = scope.global("Overloads")?;
        assert_eq!(int(&scope.invoke_method(&overloads, "TakeByte", &[i(200)])?), 200);
        expect_error(scope.invoke_method(&overloads, "TakeByte", &[i(300)]), "OverflowError");
        expect_error(scope.invoke_method(&overloads, "TakeByte", &[i(-1)]), "OverflowError");
        expect_error(scope.invoke_method(&overloads, "TakeByte", &[s("x")]), "ArgumentConversion");
        expect_error(
            scope.invoke_method(&overloads, "TakeByte", &[ScriptValue::number(2.0)]),
            "ArgumentConversion",
        );
        expect_error(scope.invoke_method(&overloads, "TakeByte", &[]), "MissingMember");
        Ok(())
    });
}

#[test]
fn test_ambiguous_overloads() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let overloads = scope.global("Overloads")?;
        expect_error(scope.invoke_method(&overloads, "Pick", &[i(1), i(2)]), "AmbiguousMember");
        assert_eq!(text(&scope.invoke_method(&overloads, "Pick", &[i(1), s("a")])?), "first");
        assert_eq!(text(&scope.invoke_method(&overloads, "Pick", &[s("a"), i(1)])?), "second");
        Ok(())
    });
}

#[test]
fn test_tie_breaks() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let overloads = scope.global("Overloads")?;
        assert_eq!(text(&scope.invoke_method(&overloads, "Describe", &[i(1)])?), "object");
        assert_eq!(text(&scope.invoke_method(&overloads, "Describe", &[s("x")])?), "object");
        assert_eq!(
            text(&scope.invoke_method(&overloads, "Scale", &[ScriptValue::number(1.5)])?),
            "single"
        );
        assert_eq!(text(&scope.invoke_method(&overloads, "Scale", &[i(2)])?), "single");
        Ok(())
    });
}

#[test]
fn test_params_array() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let overloads = scope.global("Overloads")?;
        assert_eq!(int(&scope.invoke_method(&overloads, "Sum", &[])?), 0);
        assert_eq!(int(&scope.invoke_method(&overloads, "Sum", &[i(5)])?), 5);
        assert_eq!(int(&scope.invoke_method(&overloads, "Sum", &[i(1), i(2), i(3)])?), 6);
        let packed = scope.new_array(vec![i(4), i(6)]);
        assert_eq!(int(&scope.invoke_method(&overloads, "Sum", &[packed])?), 10);
        expect_error(scope.invoke_method(&overloads, "Sum", &[i(1), s("x")]), "ArgumentConversion");
        Ok(())
    });
}

#[test]
fn test_optional_parameter_defaults() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let overloads = scope.global("Overloads")?;
        assert_eq!(text(&scope.invoke_method(&overloads, "Greet", &[s("Ann")])?), "Hello, Ann!");
        assert_eq!(
            text(&scope.invoke_method(&overloads, "Greet", &[s("Ann"), s("?")])?),
            "Hello, Ann?"
        );
        expect_error(
            scope.invoke_method(&overloads, "Greet", &[s("a"), s("b"), s("c")]),
            "MissingMember",
        );
        Ok(())
    });
}

#[test]
fn test_out_and_ref_parameters() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let overloads = scope.global("Overloads")?;
        let helpers = scope.global("host")?;
        let int32 = scope.global("Int32")?;

        let result = scope.invoke_method(&helpers, "newVar", &[int32.clone()])?;
        assert!(boolean(&scope.invoke_method(&overloads, "TryParse", &[s("42"), result.clone()])?));
        assert_eq!(int(&scope.get(&result, "value")?), 42);

        let untouched = scope.invoke_method(&helpers, "newVar", &[int32.clone(), i(9)])?;
        assert!(!boolean(&scope.invoke_method(&overloads, "TryParse", &[s("nope"), untouched.clone()])?));
        assert_eq!(int(&scope.get(&untouched, "value")?), 0);

        assert!(boolean(&scope.invoke_method(&overloads, "TryParse", &[s("7"), i(0)])?));

        let a = scope.invoke_method(&helpers, "newVar", &[int32.clone(), i(1)])?;
        let b = scope.invoke_method(&helpers, "newVar", &[int32, i(2)])?;
        assert!(scope.invoke_method(&overloads, "Swap", &[a.clone(), b.clone()])?.is_undefined());
        assert_eq!(int(&scope.get(&a, "value")?), 2);
        assert_eq!(int(&scope.get(&b, "Value")?), 1);

        let wrong = scope.invoke_method(&helpers, "newVar", &[scope.global("Int64")?, i(1)])?;
        expect_error(scope.invoke_method(&overloads, "Swap", &[wrong, b]), "ArgumentConversion");
        Ok(())
    });
}

// ============================================================================
// Host → script
// ============================================================================

#[test]
fn test_scalar_exports() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let samples = scope.global("Samples")?;
        assert_eq!(text(&scope.get(&samples, "Letter")?), "x");
        assert_eq!(number(&scope.get(&samples, "Price")?), 2.5);
        assert_eq!(int(&scope.get(&samples, "Small")?), 7);
        match scope.get(&samples, "Big")? {
            ScriptValue::Double(d) => assert_eq!(d, u64::MAX as f64),
            other => panic!("expected a double, got {:?}", other),
        }
        Ok(())
    });
}

#[test]
fn test_date_time_export() {
    let host = TestHost::with_fixtures();
    host.run(|scope| {
        let when = scope.get(&scope.global("Samples")?, "When")?;
        assert!(when.as_host_item().is_some());
        Ok(())
    });

    let host = TestHost::with_options(EngineOptions {
        enable_date_time_conversion: true,
        ..EngineOptions::default()
    });
    host.add_fixtures();
    host.run(|scope| {
        match scope.get(&scope.global("Samples")?, "When")? {
            ScriptValue::Date(ms) => assert_eq!(ms, SAMPLE_MILLIS as f64),
            other => panic!("expected a date, got {:?}", other),
        }
        Ok(())
    });
}

#[test]
fn test_null_export() {
    let host = TestHost::with_fixtures();
    host.run(|scope| {
        let samples = scope.global("Samples")?;
        assert!(matches!(scope.get(&samples, "Nothing")?, ScriptValue::Null));
        assert!(matches!(scope.get(&samples, "Anything")?, ScriptValue::Null));
        Ok(())
    });

    let host = TestHost::with_options(EngineOptions {
        null_export: NullExport::Undefined,
        ..EngineOptions::default()
    });
    host.add_fixtures();
    host.run(|scope| {
        assert!(scope.get(&scope.global("Samples")?, "Anything")?.is_undefined());
        Ok(())
    });
}

#[test]
fn test_null_result_wrapping() {
    let host = TestHost::with_options(EngineOptions {
        enable_null_result_wrapping: true,
        ..EngineOptions::default()
    });
    host.add_fixtures();

    host.run(|scope| {
        let samples = scope.global("Samples")?;
        let helpers = scope.global("host")?;

        let nothing = scope.get(&samples, "Nothing")?;
        assert!(matches!(nothing, ScriptValue::WrappedNull(_)));
        assert!(scope.strict_equals(&nothing, &ScriptValue::Null));
        assert!(!nothing.is_truthy());
        assert!(boolean(&scope.invoke_method(&helpers, "isNull", &[nothing])?));

        let anything = scope.get(&samples, "Anything")?;
        assert!(matches!(anything, ScriptValue::Null));
        Ok(())
    });
}

#[test]
fn test_array_export() {
    let host = TestHost::with_fixtures();
    host.run(|scope| {
        let items = scope.get(&scope.global("Samples")?, "Items")?;
        assert!(items.as_host_item().is_some());
        assert_eq!(int(&scope.get(&items, "length")?), 3);
        assert_eq!(int(&scope.get_index(&items, &i(1))?), 2);
        assert_eq!(int(&scope.call(&items, &[i(2)])?), 3);

        scope.set_index(&items, &i(0), i(9))?;
        assert_eq!(int(&scope.get_index(&items, &i(0))?), 9);
        expect_error(scope.get_index(&items, &i(3)), "RangeError");
        expect_error(scope.set_index(&items, &i(0), s("x")), "ArgumentConversion");
        Ok(())
    });

    let host = TestHost::with_options(EngineOptions {
        marshal_arrays_by_value: true,
        ..EngineOptions::default()
    });
    host.add_fixtures();
    host.run(|scope| {
        match scope.get(&scope.global("Samples")?, "Items")? {
            ScriptValue::Array(array) => {
                assert_eq!(array.len(), 3);
                assert_eq!(int(&array.get(2)), 3);
            }
            other => panic!("expected a script array, got {:?}", other),
        }
        Ok(())
    });
}

#[test]
fn test_new_array_helper() {
    let host = TestHost::with_fixtures();
    host.run(|scope| {
        let helpers = scope.global("host")?;
        let untyped = scope.invoke_method(&helpers, "newArr", &[i(2)])?;
        scope.set_index(&untyped, &i(0), s("any"))?;
        assert_eq!(text(&scope.get_index(&untyped, &i(0))?), "any");
        assert!(scope.get_index(&untyped, &i(1))?.is_nullish());

        let bytes = scope.invoke_method(&helpers, "newArr", &[scope.global("Byte")?, i(4)])?;
        assert_eq!(int(&scope.get(&bytes, "Length")?), 4);
        assert_eq!(int(&scope.get_index(&bytes, &i(3))?), 0);
        expect_error(scope.set_index(&bytes, &i(0), i(256)), "OverflowError");
        Ok(())
    });
}

#[test]
fn test_oversized_array_lengths_are_range_errors() {
    let host = TestHost::with_fixtures();
    host.engine
        .add_host_type("Int32Array", HostItemFlags::NONE, TypeRef::array(TypeRef::i32()))
        .unwrap();

    host.run(|scope| {
        let helpers = scope.global("host")?;
        let byte = scope.global("Byte")?;
        expect_error(scope.invoke_method(&helpers, "newArr", &[byte, i(i64::MAX)]), "RangeError");
        expect_error(scope.invoke_method(&helpers, "newArr", &[i(1 << 40)]), "RangeError");

        let array_type = scope.global("Int32Array")?;
        expect_error(scope.construct(&array_type, &[i(1 << 40)]), "RangeError");
        let small = scope.construct(&array_type, &[i(3)])?;
        assert_eq!(int(&scope.get(&small, "Length")?), 3);
        Ok(())
    });
}

// ============================================================================
// Script → host
// ============================================================================

#[test]
fn test_completion_values() {
    let host = TestHost::new();
    assert_eq!(host.eval(|_| Ok(i(5))).unwrap(), HostValue::Int32(5));
    assert_eq!(host.eval(|_| Ok(i(1 << 40))).unwrap(), HostValue::Int64(1 << 40));
    assert_eq!(host.eval(|_| Ok(ScriptValue::number(0.5))).unwrap(), HostValue::Double(0.5));
    assert_eq!(host.eval(|_| Ok(s("text"))).unwrap(), HostValue::string("text"));
    assert_eq!(host.eval(|_| Ok(ScriptValue::Undefined)).unwrap(), HostValue::Undefined);
    assert_eq!(host.engine.evaluate("null").unwrap(), HostValue::Null);
}

#[test]
fn test_typed_conversions() {
    let host = TestHost::with_fixtures();
    let engine = host.engine.engine().clone();

    assert_eq!(engine.to_host(&s("c"), &TypeRef::Char).unwrap(), HostValue::Char('c'));
    assert!(engine.to_host(&s("cc"), &TypeRef::Char).is_err());
    assert_eq!(
        engine.to_host(&ScriptValue::number(0.25), &TypeRef::decimal()).unwrap(),
        HostValue::Decimal(Decimal::new(25, 2))
    );
    assert!(engine.to_host(&ScriptValue::number(2.0), &TypeRef::i32()).is_err());
    assert!(engine.to_host(&ScriptValue::Null, &TypeRef::i32()).is_err());
    assert_eq!(engine.to_host(&ScriptValue::Null, &TypeRef::String).unwrap(), HostValue::Null);
    assert_eq!(
        engine.to_host(&ScriptValue::Undefined, &TypeRef::Object).unwrap(),
        HostValue::Undefined
    );

    let list = ScriptValue::Array(hostbind_engine::ScriptArray::new(vec![i(1), i(2)]));
    match engine.to_host(&list, &TypeRef::array(TypeRef::i64())).unwrap() {
        HostValue::Array(array) => {
            assert_eq!(array.to_vec(), vec![HostValue::Int64(1), HostValue::Int64(2)]);
        }
        other => panic!("expected an array, got {:?}", other),
    }

    let host_array = HostArray::new(TypeRef::i32(), vec![HostValue::Int32(1)]);
    let exported = engine
        .to_script(HostValue::Array(host_array.clone()), &TypeRef::Object)
        .unwrap();
    match engine.to_host(&exported, &TypeRef::array(TypeRef::i32())).unwrap() {
        HostValue::Array(array) => assert!(array.ptr_eq(&host_array)),
        other => panic!("expected the same array, got {:?}", other),
    }
}

#[test]
fn test_numeric_targets_agree_with_their_range() {
    let host = TestHost::new();
    let engine = host.engine.engine().clone();
    let ints = [0, 1, -1, 200, 300, -200, 40_000, 70_000, 1 << 40, i64::MAX, i64::MIN];
    let doubles = [2.0, 2.5, -0.5, 1e300];

    for kind in NumericKind::ALL {
        for target in [TypeRef::Numeric(kind), TypeRef::nullable(TypeRef::Numeric(kind))] {
            let nullable = matches!(target, TypeRef::Nullable(_));

            for n in ints {
                let result = engine.to_host(&i(n), &target);
                if !kind.is_integral() || kind.contains(n as i128) {
                    let value = result.unwrap_or_else(|e| panic!("{} -> {}: {}", n, target, e));
                    assert_eq!(value.numeric_kind(), Some(kind), "{} -> {}", n, target);
                    if kind.is_integral() {
                        assert_eq!(value.to_i128(), Some(n as i128));
                    }
                } else {
                    let err = result.expect_err("out of range");
                    assert_eq!(err.name(), "OverflowError", "{} -> {}", n, target);
                }
            }

            for d in doubles {
                let result = engine.to_host(&ScriptValue::number(d), &target);
                let expected = match kind {
                    k if k.is_integral() => Some("ArgumentConversion"),
                    NumericKind::Double => None,
                    _ if d.abs() > 1e200 => Some("OverflowError"),
                    _ => None,
                };
                match (expected, result) {
                    (None, Ok(value)) => {
                        assert_eq!(value.numeric_kind(), Some(kind));
                        assert_eq!(value.to_f64(), Some(d), "{} -> {}", d, target);
                    }
                    (Some(name), Err(err)) => assert_eq!(err.name(), name, "{} -> {}", d, target),
                    (expected, result) => panic!("{} -> {}: expected {:?}, got {:?}", d, target, expected, result),
                }
            }

            let null = engine.to_host(&ScriptValue::Null, &target);
            if nullable {
                assert_eq!(null.unwrap(), HostValue::Null);
            } else {
                assert_eq!(null.unwrap_err().name(), "ArgumentConversion");
            }
        }
    }
}

//! The `host` helper functions

use crate::harness::*;
use hostbind_sdk::Decimal;

fn helper(scope: &ScriptScope, name: &str, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
    let helpers = scope.global("host")?;
    scope.invoke_method(&helpers, name, args)
}

// ============================================================================
// Type tests
// ============================================================================

#[test]
fn test_cast() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    host.run(|scope| {
        let int32 = scope.global("Int32")?;
        let byte = scope.global("Byte")?;
        assert_eq!(int(&helper(scope, "cast", &[int32.clone(), i(5)])?), 5);
        expect_error(helper(scope, "cast", &[byte, i(300)]), "OverflowError");
        expect_error(helper(scope, "cast", &[int32, ScriptValue::number(1.5)]), "ArgumentConversion");
        expect_error(helper(scope, "cast", &[i(1), i(1)]), "ArgumentConversion");

        let counter = scope.global("counter")?;
        let same = helper(scope, "cast", &[scope.global("Counter")?, counter.clone()])?;
        assert!(scope.strict_equals(&same, &counter));
        Ok(())
    });
}

#[test]
fn test_is_type_and_as_type() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));
    host.add("bag", bag());

    host.run(|scope| {
        let counter_type = scope.global("Counter")?;
        let counter = scope.global("counter")?;
        let bag = scope.global("bag")?;

        assert!(boolean(&helper(scope, "isType", &[counter_type.clone(), counter.clone()])?));
        assert!(!boolean(&helper(scope, "isType", &[counter_type.clone(), bag.clone()])?));
        assert!(!boolean(&helper(scope, "isType", &[counter_type.clone(), ScriptValue::Null])?));
        assert!(boolean(&helper(scope, "isType", &[scope.global("String")?, s("x")])?));
        assert!(boolean(&helper(scope, "isType", &[scope.global("Int32")?, i(5)])?));

        let same = helper(scope, "asType", &[counter_type.clone(), counter.clone()])?;
        assert!(scope.strict_equals(&same, &counter));
        assert!(matches!(helper(scope, "asType", &[counter_type, bag])?, ScriptValue::Null));
        Ok(())
    });
}

#[test]
fn test_type_of() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let int32 = scope.global("Int32")?;
        let ty = helper(scope, "typeOf", &[i(5)])?;
        assert!(scope.strict_equals(&ty, &int32));

        let counter_type = scope.global("Counter")?;
        let same = helper(scope, "typeOf", &[counter_type.clone()])?;
        assert!(scope.strict_equals(&same, &counter_type));

        expect_error(helper(scope, "typeOf", &[ScriptValue::Null]), "ArgumentConversion");
        expect_error(helper(scope, "typeOf", &[]), "ArgumentConversion");
        Ok(())
    });
}

#[test]
fn test_is_null() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        assert!(boolean(&helper(scope, "isNull", &[ScriptValue::Null])?));
        assert!(boolean(&helper(scope, "isNull", &[ScriptValue::Undefined])?));
        assert!(boolean(&helper(scope, "isNull", &[])?));
        assert!(!boolean(&helper(scope, "isNull", &[i(0)])?));
        assert!(!boolean(&helper(scope, "isNull", &[s("")])?));
        Ok(())
    });
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_obj() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let plain = helper(scope, "newObj", &[])?;
        assert!(matches!(plain, ScriptValue::Object(_)));
        scope.set(&plain, "a", i(1))?;
        assert_eq!(int(&scope.get(&plain, "a")?), 1);

        let counter = helper(scope, "newObj", &[scope.global("Counter")?, i(5)])?;
        assert_eq!(int(&scope.get(&counter, "Count")?), 5);
        let fresh = helper(scope, "newObj", &[scope.global("Counter")?])?;
        assert_eq!(int(&scope.get(&fresh, "Count")?), 0);

        expect_error(helper(scope, "newObj", &[i(5)]), "ArgumentConversion");
        Ok(())
    });
}

#[test]
fn test_new_var() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let int32 = scope.global("Int32")?;
        let var = helper(scope, "newVar", &[int32.clone()])?;
        assert_eq!(int(&scope.get(&var, "value")?), 0);
        scope.set(&var, "value", i(3))?;
        assert_eq!(int(&scope.get(&var, "Value")?), 3);
        expect_error(scope.set(&var, "value", s("x")), "ArgumentConversion");

        let text_var = helper(scope, "newVar", &[scope.global("String")?, s("hi")])?;
        assert_eq!(text(&scope.get(&text_var, "value")?), "hi");

        expect_error(helper(scope, "newVar", &[int32, s("x")]), "ArgumentConversion");
        expect_error(helper(scope, "newVar", &[i(1)]), "ArgumentConversion");
        Ok(())
    });
}

#[test]
fn test_flags() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let perms = scope.global("Perms")?;
        let read = scope.get(&perms, "Read")?;
        let write = scope.get(&perms, "Write")?;
        let combined = helper(scope, "flags", &[read.clone(), write])?;
        match scope.to_host(&combined) {
            HostValue::Enum(value) => {
                assert_eq!(value.raw, 3);
                assert_eq!(value.ty.name(), "Perms");
            }
            other => panic!("expected an enum, got {:?}", other),
        }

        let red = scope.get(&scope.global("Color")?, "Red")?;
        expect_error(helper(scope, "flags", &[red.clone()]), "ArgumentConversion");
        expect_error(helper(scope, "flags", &[read, red]), "ArgumentConversion");
        expect_error(helper(scope, "flags", &[i(1)]), "ArgumentConversion");
        expect_error(helper(scope, "flags", &[]), "ArgumentConversion");
        Ok(())
    });
}

// ============================================================================
// Explicit coercions
// ============================================================================

#[test]
fn test_numeric_coercions() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let coerce = |name: &str, value: ScriptValue| -> ScriptResult<HostValue> {
            let boxed = helper(scope, name, &[value])?;
            assert!(boxed.as_host_item().is_some());
            Ok(scope.to_host(&boxed))
        };

        assert_eq!(coerce("toInt32", ScriptValue::number(2.9))?, HostValue::Int32(2));
        assert_eq!(coerce("toInt32", ScriptValue::number(-2.9))?, HostValue::Int32(-2));
        assert_eq!(coerce("toInt16", s(" 12 "))?, HostValue::Int16(12));
        assert_eq!(coerce("toSByte", i(-5))?, HostValue::Int8(-5));
        assert_eq!(coerce("toUInt32", i(7))?, HostValue::UInt32(7));
        assert_eq!(coerce("toSingle", i(1))?, HostValue::Single(1.0));
        assert_eq!(coerce("toDecimal", ScriptValue::number(1.5))?, HostValue::Decimal(Decimal::new(15, 1)));

        let double = helper(scope, "toDouble", &[ScriptValue::number(3.7)])?;
        assert_eq!(coerce("toInt64", double)?, HostValue::Int64(3));
        let price = scope.get(&scope.global("Samples")?, "Price")?;
        assert_eq!(coerce("toInt32", price)?, HostValue::Int32(2));

        expect_error(coerce("toByte", i(256)), "OverflowError");
        expect_error(coerce("toUInt64", i(-1)), "OverflowError");
        expect_error(coerce("toInt32", ScriptValue::number(f64::INFINITY)), "OverflowError");
        expect_error(coerce("toInt32", s("abc")), "ArgumentConversion");
        expect_error(coerce("toInt32", ScriptValue::Bool(true)), "ArgumentConversion");
        Ok(())
    });
}

#[test]
fn test_to_char() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let a = helper(scope, "toChar", &[s("a")])?;
        assert_eq!(scope.to_host(&a), HostValue::Char('a'));
        let upper = helper(scope, "toChar", &[i(65)])?;
        assert_eq!(scope.to_host(&upper), HostValue::Char('A'));

        expect_error(helper(scope, "toChar", &[s("ab")]), "ArgumentConversion");
        expect_error(helper(scope, "toChar", &[i(70_000)]), "OverflowError");
        Ok(())
    });
}

// ============================================================================
// Dynamic objects
// ============================================================================

#[test]
fn test_dynamic_members() {
    let host = TestHost::with_fixtures();
    host.add("props", property_bag());

    host.run(|scope| {
        let props = scope.global("props")?;
        assert!(scope.get(&props, "x")?.is_undefined());
        scope.set(&props, "x", i(1))?;
        scope.set(&props, "a", s("first"))?;
        assert_eq!(int(&scope.get(&props, "x")?), 1);

        assert_eq!(text(&scope.get(&props, "Kind")?), "property bag");
        assert_eq!(text(&scope.invoke_method(&props, "Describe", &[])?), "dynamic");

        let names = scope.member_names(&props)?;
        assert_eq!(&names[..2], &["a".to_string(), "x".to_string()]);
        assert!(names.iter().any(|n| n == "Kind"));
        Ok(())
    });
}

#[test]
fn test_static_type_bypasses_dynamic_dispatch() {
    let host = TestHost::with_fixtures();
    host.add("props", property_bag());

    host.run(|scope| {
        let props = scope.global("props")?;
        scope.set(&props, "x", i(1))?;

        let direct = helper(scope, "toStaticType", &[props.clone()])?;
        assert!(!scope.strict_equals(&direct, &props));
        assert_eq!(text(&scope.invoke_method(&direct, "Describe", &[])?), "static");
        assert_eq!(text(&scope.get(&direct, "Kind")?), "property bag");
        assert!(scope.get(&direct, "x")?.is_undefined());
        expect_error(scope.set(&direct, "y", i(2)), "MissingMember");
        expect_error(helper(scope, "del", &[direct, s("x")]), "NotSupported");

        let counter_type = scope.global("Counter")?;
        let unchanged = helper(scope, "toStaticType", &[counter_type.clone()])?;
        assert!(scope.strict_equals(&unchanged, &counter_type));
        Ok(())
    });
}

#[test]
fn test_del() {
    let host = TestHost::with_fixtures();
    host.add("props", property_bag());
    host.add("counter", counter(1));

    host.run(|scope| {
        let props = scope.global("props")?;
        scope.set(&props, "x", i(1))?;
        assert!(boolean(&helper(scope, "del", &[props.clone(), s("x")])?));
        assert!(!boolean(&helper(scope, "del", &[props.clone(), s("x")])?));
        assert!(scope.get(&props, "x")?.is_undefined());

        let plain = scope.new_object([("a", i(1))]);
        assert!(boolean(&helper(scope, "del", &[plain.clone(), s("a")])?));
        assert!(scope.get(&plain, "a")?.is_undefined());

        let counter = scope.global("counter")?;
        expect_error(helper(scope, "del", &[counter, s("Count")]), "NotSupported");
        expect_error(helper(scope, "del", &[props, i(1)]), "ArgumentConversion");
        Ok(())
    });
}

use pretty_assertions::assert_eq;
use sea_core::ir::builder::{declaration, FunctionBuilder};
use sea_core::ir::io::{read_module, write_module, ModuleFormat, ModuleIoError};
use sea_core::ir::{BinaryOp, Constant, Global, Linkage, Module, Ty, Value};
use std::io::Write;
use tempfile::NamedTempFile;

fn sample_module() -> Module {
    let mut module = Module::new("sample");
    module.data_layout = Some("e-p:64:64".to_string());
    module.globals.push(Global {
        name: "counter".to_string(),
        ty: Ty::I32,
        initializer: Some(sea_core::ir::Constant::int(3, Ty::I32)),
        linkage: Linkage::Internal,
        is_constant: false,
    });

    let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
    let value = main.load(Ty::I32, Value::global("counter"));
    let sum = main.binary_nsw(BinaryOp::Add, Ty::I32, value, Value::int(1, Ty::I32));
    main.call("verifier.assume", Ty::Void, vec![Value::bool(true)]);
    main.ret(Some(sum));
    module.functions.push(main.finish());
    module
        .functions
        .push(declaration("verifier.assume", vec![Ty::I1], Ty::Void));
    module
}

#[test]
fn binary_module_files_read_back() {
    let module = sample_module();
    let mut file = NamedTempFile::new().unwrap();
    write_module(&module, ModuleFormat::Binary, file.as_file_mut()).unwrap();

    let read = read_module(file.path()).unwrap();
    assert_eq!(read, module);
}

#[test]
fn json_module_files_read_back() {
    let module = sample_module();
    let mut file = NamedTempFile::new().unwrap();
    write_module(&module, ModuleFormat::Json, file.as_file_mut()).unwrap();

    assert_eq!(read_module(file.path()).unwrap(), module);
}

#[test]
fn text_listing_shows_every_function() {
    let mut text = Vec::new();
    write_module(&sample_module(), ModuleFormat::Text, &mut text).unwrap();
    let text = String::from_utf8(text).unwrap();

    assert!(text.contains("target datalayout = \"e-p:64:64\""));
    assert!(text.contains("@counter = internal global i32 i32 3"));
    assert!(text.contains("define i32 @main() {"));
    assert!(text.contains("add nsw %0, i32 1"));
    assert!(text.contains("declare void @verifier.assume(i1 %0)"));
}

#[test]
fn unreadable_inputs_are_reported() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"\x7fELF garbage").unwrap();
    assert!(matches!(
        read_module(file.path()),
        Err(ModuleIoError::UnknownEncoding)
    ));

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        read_module(&missing),
        Err(ModuleIoError::Read { .. })
    ));
}

fn module_returning(constant: Constant) -> Module {
    let mut module = Module::new("wide");
    let mut main = FunctionBuilder::new("main", Vec::new(), Ty::I32);
    let quotient = main.binary(
        BinaryOp::SDiv,
        Ty::I32,
        Value::Const(constant),
        Value::int(-1, Ty::I32),
    );
    main.ret(Some(quotient));
    module.functions.push(main.finish());
    module
}

#[test]
fn constants_wider_than_their_type_are_rejected() {
    let module = module_returning(Constant::Int {
        value: i64::MIN,
        ty: Ty::I32,
    });
    let mut file = NamedTempFile::new().unwrap();
    write_module(&module, ModuleFormat::Json, file.as_file_mut()).unwrap();

    let err = read_module(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ModuleIoError::ConstantRange { value: i64::MIN, ty: Ty::I32 }
    ));
    assert!(err.to_string().contains("does not fit i32"));
}

#[test]
fn unsigned_spellings_are_read_sign_extended() {
    let module = module_returning(Constant::Int {
        value: 4_294_967_295,
        ty: Ty::I32,
    });
    let mut file = NamedTempFile::new().unwrap();
    write_module(&module, ModuleFormat::Binary, file.as_file_mut()).unwrap();

    let read = read_module(file.path()).unwrap();
    assert_eq!(read, module_returning(Constant::int(-1, Ty::I32)));
}

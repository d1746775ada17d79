// tests/pipeline_test.rs
use std::fs;
use std::path::{Path, PathBuf};

use mdgen::cli::OutputFormatter;
use mdgen::diag::Severity;
use mdgen::pipeline::Pipeline;
use mdgen::project::Project;

const TEMPORAL_SQL: &str = r#"
/*****************************************************************************
 * Comparison functions
 *****************************************************************************/

CREATE FUNCTION temporal_lt(tint, tint)
  RETURNS boolean
  AS 'MODULE_PATHNAME', 'Temporal_lt'
  LANGUAGE C IMMUTABLE STRICT PARALLEL SAFE;

/*****************************************************************************
 * Equality functions
 *****************************************************************************/

CREATE FUNCTION eq(tint a, tint b)
  RETURNS boolean
  AS 'MODULE_PATHNAME', 'tint_eq'
  LANGUAGE C IMMUTABLE STRICT PARALLEL SAFE;
"#;

const TEMPORAL_C: &str = r#"
PGDLLEXPORT Datum tint_eq(PG_FUNCTION_ARGS);
PG_FUNCTION_INFO_V1(tint_eq);
/**
 * @brief Return true if the temporal values are equal
 */
Datum
tint_eq(PG_FUNCTION_ARGS)
{
  Temporal *temp1 = PG_GETARG_TEMPORAL_P(0);
  Temporal *temp2 = PG_GETARG_TEMPORAL_P(1);
  PG_RETURN_BOOL(temporal_eq(temp1, temp2));
}

PGDLLEXPORT Datum Temporal_lt(PG_FUNCTION_ARGS);
PG_FUNCTION_INFO_V1(Temporal_lt);
Datum
Temporal_lt(PG_FUNCTION_ARGS)
{
  Temporal *temp1 = PG_GETARG_TEMPORAL_P(0);
  Temporal *temp2 = PG_GETARG_TEMPORAL_P(1);
  PG_RETURN_BOOL(temporal_lt(temp1, temp2));
}
"#;

const TBOX_SQL: &str = r#"
CREATE TYPE tbox;

/*****************************************************************************
 * Input/output functions
 *****************************************************************************/

CREATE FUNCTION tbox_in(cstring)
  RETURNS tbox
  AS 'MODULE_PATHNAME', 'Tbox_in'
  LANGUAGE C IMMUTABLE STRICT PARALLEL SAFE;
CREATE FUNCTION tbox_out(tbox)
  RETURNS cstring
  AS 'MODULE_PATHNAME', 'Tbox_out'
  LANGUAGE C IMMUTABLE STRICT PARALLEL SAFE;

/*****************************************************************************
 * Conversion functions
 *****************************************************************************/

CREATE FUNCTION tbox(integer)
  RETURNS tbox
  AS 'MODULE_PATHNAME', 'Number_to_tbox'
  LANGUAGE C IMMUTABLE PARALLEL SAFE STRICT;
CREATE FUNCTION tbox(float)
  RETURNS tbox
  AS 'MODULE_PATHNAME', 'Number_to_tbox'
  LANGUAGE C IMMUTABLE PARALLEL SAFE STRICT;

CREATE CAST (integer AS tbox) WITH FUNCTION tbox(integer);
CREATE CAST (float AS tbox) WITH FUNCTION tbox(float);

/*****************************************************************************
 * Accessor functions
 *****************************************************************************/

CREATE FUNCTION Xmin(tbox)
  RETURNS float
  AS 'MODULE_PATHNAME', 'Tbox_xmin'
  LANGUAGE C IMMUTABLE STRICT PARALLEL SAFE;
"#;

const TBOX_C: &str = r#"
PGDLLEXPORT Datum Tbox_in(PG_FUNCTION_ARGS);
PG_FUNCTION_INFO_V1(Tbox_in);
Datum
Tbox_in(PG_FUNCTION_ARGS)
{
  const char *input = PG_GETARG_CSTRING(0);
  PG_RETURN_TBOX_P(tbox_in(input));
}

PGDLLEXPORT Datum Tbox_out(PG_FUNCTION_ARGS);
PG_FUNCTION_INFO_V1(Tbox_out);
Datum
Tbox_out(PG_FUNCTION_ARGS)
{
  TBox *box = PG_GETARG_TBOX_P(0);
  PG_RETURN_CSTRING(tbox_out(box, OUT_DEFAULT_DECIMAL_DIGITS));
}

PGDLLEXPORT Datum Number_to_tbox(PG_FUNCTION_ARGS);
PG_FUNCTION_INFO_V1(Number_to_tbox);
Datum
Number_to_tbox(PG_FUNCTION_ARGS)
{
  Datum value = PG_GETARG_DATUM(0);
  meosType basetype = oid_type(get_fn_expr_argtype(fcinfo->flinfo, 0));
  PG_RETURN_TBOX_P(number_tbox(value, basetype));
}

PGDLLEXPORT Datum Tbox_xmin(PG_FUNCTION_ARGS);
PG_FUNCTION_INFO_V1(Tbox_xmin);
Datum
Tbox_xmin(PG_FUNCTION_ARGS)
{
  TBox *box = PG_GETARG_TBOX_P(0);
  double result;
  if (! tbox_xmin(box, &result))
    PG_RETURN_NULL();
  PG_RETURN_FLOAT8(result);
}
"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, content).unwrap();
    p
}

fn project(struct_name: &str) -> Project {
    Project {
        struct_name: struct_name.to_string(),
        module: "tbox_functions".to_string(),
        ..Project::default()
    }
}

#[test]
fn tint_eq_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let sql = write(dir.path(), "temporal.sql", TEMPORAL_SQL);
    let c = write(dir.path(), "temporal.c", TEMPORAL_C);
    let out_dir = dir.path().join("out");

    let proj = project("TemporalFunctions");
    let out = OutputFormatter::new(true);
    let mut p = Pipeline::new(&proj, &out);
    let summary = p.run(&[sql], &[c], &out_dir, false).unwrap();

    // Temporal_lt 属于 comparison 分类，不生成
    assert_eq!(summary.emitted, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let source = fs::read_to_string(out_dir.join("tbox_functions.cpp")).unwrap();
    assert!(source.contains("void TemporalFunctions::Tint_eq(DataChunk &args, ExpressionState &state, Vector &result) {"));
    assert!(source.contains("BinaryExecutor::Execute<string_t, string_t, bool>("));
    assert!(source.contains("[&](string_t args0, string_t args1) {"));
    assert!(source.contains("Temporal *temp1 = nullptr;"));
    assert!(source.contains("memcpy(temp2, args1.GetDataUnsafe(), args1.GetSize());"));
    assert!(source.contains("bool ret = temporal_eq(temp1, temp2);"));

    let header = fs::read_to_string(out_dir.join("tbox_functions.hpp")).unwrap();
    assert!(header.contains("struct TemporalFunctions {"));
    assert!(header.contains("static void Tint_eq(DataChunk &args, ExpressionState &state, Vector &result);"));
}

#[test]
fn overloads_casts_and_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let sql = write(dir.path(), "tbox.sql", TBOX_SQL);
    let c = write(dir.path(), "tbox.c", TBOX_C);
    let out_dir = dir.path().join("out");

    let proj = project("TboxFunctions");
    let out = OutputFormatter::new(true);
    let mut p = Pipeline::new(&proj, &out);
    let ddl = p.load_declarations(&[sql]).unwrap();
    let natives = p.load_natives(&[c]).unwrap();
    assert_eq!(ddl.decls.len(), 5);
    assert_eq!(natives.len(), 4);

    let generated = p.generate(&ddl, &natives).unwrap();
    let names: Vec<&str> = generated.units.iter().map(|u| u.function.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Tbox_in_cast",
            "Tbox_out_cast",
            "Number_to_tbox_integer",
            "Number_to_tbox_integer_cast",
            "Number_to_tbox_float",
            "Number_to_tbox_float_cast",
            "Tbox_xmin",
        ]
    );
    assert_eq!(generated.failed, 0);

    let src = &generated.source;
    assert!(src.contains("Datum value = DataHelpers::getDatum<int32_t>(args0);"));
    assert!(src.contains("meosType basetype = DataHelpers::getMeosType<double>(args0);"));
    assert!(src.contains("UnaryExecutor::ExecuteWithNulls<string_t, double>("));
    assert!(src.contains("if (! tbox_xmin(box, &ret)) {"));
    assert!(src.contains("string_t out = StringVector::AddString(result, ret);"));

    p.write(&generated, &out_dir).unwrap();
    assert!(out_dir.join("tbox_functions.cpp").exists());
}

#[test]
fn rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let sql = write(dir.path(), "tbox.sql", TBOX_SQL);
    let c = write(dir.path(), "tbox.c", TBOX_C);
    let out_dir = dir.path().join("out");
    let proj = project("TboxFunctions");
    let out = OutputFormatter::new(true);

    let mut first = Pipeline::new(&proj, &out);
    first.run(&[sql.clone()], &[c.clone()], &out_dir, false).unwrap();
    let h1 = fs::read(out_dir.join("tbox_functions.hpp")).unwrap();
    let s1 = fs::read(out_dir.join("tbox_functions.cpp")).unwrap();

    let mut second = Pipeline::new(&proj, &out);
    second.run(&[sql], &[c], &out_dir, false).unwrap();
    assert_eq!(h1, fs::read(out_dir.join("tbox_functions.hpp")).unwrap());
    assert_eq!(s1, fs::read(out_dir.join("tbox_functions.cpp")).unwrap());
}

#[test]
fn missing_files_warn_and_continue() {
    let dir = tempfile::tempdir().unwrap();
    let c = write(dir.path(), "temporal.c", TEMPORAL_C);
    let out_dir = dir.path().join("out");
    let proj = project("S");
    let out = OutputFormatter::new(true);

    let mut p = Pipeline::new(&proj, &out);
    let summary = p
        .run(&[dir.path().join("nope.sql")], &[c], &out_dir, false)
        .unwrap();
    assert_eq!(summary.emitted, 0);
    assert_eq!(p.diags.count(Severity::Warning), 1);

    let header = fs::read_to_string(out_dir.join("tbox_functions.hpp")).unwrap();
    assert!(header.contains("struct S {\n};"));
}

#[test]
fn outputs_are_placed_into_project_tree() {
    let dir = tempfile::tempdir().unwrap();
    let sql = write(dir.path(), "temporal.sql", TEMPORAL_SQL);
    let c = write(dir.path(), "temporal.c", TEMPORAL_C);
    let root = dir.path().join("mobilityduck");

    let proj = Project {
        project_root: Some(root.clone()),
        ..project("TemporalFunctions")
    };
    let out = OutputFormatter::new(true);
    let mut p = Pipeline::new(&proj, &out);
    let summary = p.run(&[sql], &[c], &dir.path().join("out"), false).unwrap();

    assert_eq!(summary.written.len(), 4);
    let placed = fs::read_to_string(root.join("src/gen/tbox_functions.cpp")).unwrap();
    let original = fs::read_to_string(dir.path().join("out/tbox_functions.cpp")).unwrap();
    assert_eq!(placed, original);
    assert!(root.join("src/include/gen/tbox_functions.hpp").exists());
}

#[test]
fn relative_inputs_use_configured_roots() {
    let dir = tempfile::tempdir().unwrap();
    let sql_dir = dir.path().join("sql");
    let src_dir = dir.path().join("src");
    fs::create_dir_all(&sql_dir).unwrap();
    fs::create_dir_all(&src_dir).unwrap();
    write(&sql_dir, "temporal.sql", TEMPORAL_SQL);
    write(&src_dir, "temporal.c", TEMPORAL_C);

    let proj = Project {
        sql_dir: Some(sql_dir),
        src_dir: Some(src_dir),
        ..project("T")
    };
    let out = OutputFormatter::new(true);
    let mut p = Pipeline::new(&proj, &out);
    let summary = p
        .run(&[PathBuf::from("temporal.sql")], &[PathBuf::from("temporal.c")], &dir.path().join("out"), false)
        .unwrap();
    assert_eq!(summary.emitted, 1);
    assert!(p.diags.is_empty());
}

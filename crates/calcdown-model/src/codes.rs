//! Stable diagnostic codes.
//!
//! UIs and tests match on these; the accompanying message text may change freely.

// Document structure.
pub const BLOCK_UNKNOWN_LANG: &str = "CD_BLOCK_UNKNOWN_LANG";
pub const BLOCK_MISSING_LANG: &str = "CD_BLOCK_MISSING_LANG";
pub const NAME_RESERVED_STD: &str = "CD_NAME_RESERVED_STD";
pub const NAME_CONFLICT_INPUT_NODE: &str = "CD_NAME_CONFLICT_INPUT_NODE";
pub const NAME_CONFLICT_INPUT_TABLE: &str = "CD_NAME_CONFLICT_INPUT_TABLE";
pub const NAME_CONFLICT_TABLE_INPUT: &str = "CD_NAME_CONFLICT_TABLE_INPUT";
pub const NAME_CONFLICT_TABLE_NODE: &str = "CD_NAME_CONFLICT_TABLE_NODE";
pub const NAME_CONFLICT_NODE_INPUT: &str = "CD_NAME_CONFLICT_NODE_INPUT";
pub const NAME_CONFLICT_NODE_TABLE: &str = "CD_NAME_CONFLICT_NODE_TABLE";

// Inputs.
pub const INPUT_INVALID_LINE: &str = "CD_INPUT_INVALID_LINE";
pub const INPUT_DUPLICATE_NAME: &str = "CD_INPUT_DUPLICATE_NAME";
pub const INPUT_INVALID_DEFAULT: &str = "CD_INPUT_INVALID_DEFAULT";
pub const INPUT_DUPLICATE_ACROSS_BLOCKS: &str = "CD_INPUT_DUPLICATE_ACROSS_BLOCKS";
pub const OVERRIDE_UNKNOWN: &str = "CD_OVERRIDE_UNKNOWN";
pub const OVERRIDE_INVALID: &str = "CD_OVERRIDE_INVALID";

// Data tables.
pub const DATA_MISSING_SEPARATOR: &str = "CD_DATA_MISSING_SEPARATOR";
pub const DATA_HEADER_INVALID_LINE: &str = "CD_DATA_HEADER_INVALID_LINE";
pub const DATA_COLUMNS_INVALID_ENTRY: &str = "CD_DATA_COLUMNS_INVALID_ENTRY";
pub const DATA_HEADER_UNKNOWN_KEY: &str = "CD_DATA_HEADER_UNKNOWN_KEY";
pub const DATA_HEADER_MISSING_NAME: &str = "CD_DATA_HEADER_MISSING_NAME";
pub const DATA_INVALID_NAME: &str = "CD_DATA_INVALID_NAME";
pub const DATA_RESERVED_NAME: &str = "CD_DATA_RESERVED_NAME";
pub const DATA_HEADER_MISSING_PRIMARY_KEY: &str = "CD_DATA_HEADER_MISSING_PRIMARY_KEY";
pub const DATA_HEADER_MISSING_COLUMNS: &str = "CD_DATA_HEADER_MISSING_COLUMNS";
pub const DATA_PRIMARYKEY_NOT_DECLARED: &str = "CD_DATA_PRIMARYKEY_NOT_DECLARED";
pub const DATA_SORTBY_INVALID: &str = "CD_DATA_SORTBY_INVALID";
pub const DATA_SORTBY_UNKNOWN: &str = "CD_DATA_SORTBY_UNKNOWN";
pub const DATA_SORTBY_RUNTIME: &str = "CD_DATA_SORTBY_RUNTIME";
pub const DATA_EXTERNAL_FORMAT: &str = "CD_DATA_EXTERNAL_FORMAT";
pub const DATA_EXTERNAL_MISSING_HASH: &str = "CD_DATA_EXTERNAL_MISSING_HASH";
pub const DATA_EXTERNAL_INVALID_HASH: &str = "CD_DATA_EXTERNAL_INVALID_HASH";
pub const DATA_EXTERNAL_INLINE_ROWS: &str = "CD_DATA_EXTERNAL_INLINE_ROWS";
pub const DATA_UNUSED_FORMAT: &str = "CD_DATA_UNUSED_FORMAT";
pub const DATA_UNUSED_HASH: &str = "CD_DATA_UNUSED_HASH";
pub const DATA_DUPLICATE_TABLE_NAME: &str = "CD_DATA_DUPLICATE_TABLE_NAME";
pub const DATA_ROW_INVALID_JSON: &str = "CD_DATA_ROW_INVALID_JSON";
pub const DATA_ROW_NOT_OBJECT: &str = "CD_DATA_ROW_NOT_OBJECT";
pub const DATA_ROW_MISSING_PK: &str = "CD_DATA_ROW_MISSING_PK";
pub const DATA_PK_TYPE: &str = "CD_DATA_PK_TYPE";
pub const DATA_PK_DUPLICATE: &str = "CD_DATA_PK_DUPLICATE";
pub const DATA_INVALID_VALUE: &str = "CD_DATA_INVALID_VALUE";
pub const DATA_SOURCE_READ: &str = "CD_DATA_SOURCE_READ";
pub const DATA_HASH_MISMATCH: &str = "CD_DATA_HASH_MISMATCH";
pub const DATA_CSV_MISSING_COLUMN: &str = "CD_DATA_CSV_MISSING_COLUMN";
pub const DATA_JSON_PARSE: &str = "CD_DATA_JSON_PARSE";
pub const DATA_JSON_NOT_ARRAY: &str = "CD_DATA_JSON_NOT_ARRAY";

// Calc declarations and compilation.
pub const CALC_DECL_EXPECT_IDENTIFIER: &str = "CD_CALC_DECL_EXPECT_IDENTIFIER";
pub const CALC_DECL_EXPECT_EQUALS: &str = "CD_CALC_DECL_EXPECT_EQUALS";
pub const CALC_DECL_MISSING_SEMICOLON: &str = "CD_CALC_DECL_MISSING_SEMICOLON";
pub const CALC_DUPLICATE_NODE: &str = "CD_CALC_DUPLICATE_NODE";
pub const CALC_DUPLICATE_NODE_ACROSS_BLOCKS: &str = "CD_CALC_DUPLICATE_NODE_ACROSS_BLOCKS";
pub const CALC_PARSE_EXPR: &str = "CD_CALC_PARSE_EXPR";
pub const CALC_DISALLOWED_MEMBER: &str = "CD_CALC_DISALLOWED_MEMBER";
pub const CALC_DISALLOWED_OBJECT_KEY: &str = "CD_CALC_DISALLOWED_OBJECT_KEY";
pub const CALC_ARROW_PARAM_RESERVED: &str = "CD_CALC_ARROW_PARAM_RESERVED";
pub const CALC_DISALLOWED_PARAM: &str = "CD_CALC_DISALLOWED_PARAM";
pub const CALC_DUPLICATE_PARAM: &str = "CD_CALC_DUPLICATE_PARAM";

// Evaluation.
pub const CALC_CYCLE: &str = "CD_CALC_CYCLE";
pub const CALC_DIV_ZERO: &str = "CD_CALC_DIV_ZERO";
pub const CALC_NONFINITE: &str = "CD_CALC_NONFINITE";
pub const CALC_UNKNOWN_IDENTIFIER: &str = "CD_CALC_UNKNOWN_IDENTIFIER";
pub const CALC_UNKNOWN_PROPERTY: &str = "CD_CALC_UNKNOWN_PROPERTY";
pub const CALC_UPSTREAM_ERROR: &str = "CD_CALC_UPSTREAM_ERROR";
pub const CALC_UNSAFE_CALL: &str = "CD_CALC_UNSAFE_CALL";
pub const CALC_EVAL: &str = "CD_CALC_EVAL";

// Table patches.
pub const CALC_PATCH_INVALID_SELECTOR: &str = "CD_CALC_PATCH_INVALID_SELECTOR";
pub const CALC_PATCH_PARSE_EXPR: &str = "CD_CALC_PATCH_PARSE_EXPR";
pub const CALC_PATCH_UNKNOWN_TABLE: &str = "CD_CALC_PATCH_UNKNOWN_TABLE";
pub const CALC_PATCH_EXTERNAL_TABLE: &str = "CD_CALC_PATCH_EXTERNAL_TABLE";
pub const CALC_PATCH_DISALLOWED_KEY: &str = "CD_CALC_PATCH_DISALLOWED_KEY";
pub const CALC_PATCH_UNKNOWN_COLUMN: &str = "CD_CALC_PATCH_UNKNOWN_COLUMN";
pub const CALC_PATCH_PRIMARYKEY: &str = "CD_CALC_PATCH_PRIMARYKEY";
pub const CALC_PATCH_TARGET_NOT_TABLE: &str = "CD_CALC_PATCH_TARGET_NOT_TABLE";
pub const CALC_PATCH_POSITIONAL: &str = "CD_CALC_PATCH_POSITIONAL";
pub const CALC_PATCH_ROW_NOT_FOUND: &str = "CD_CALC_PATCH_ROW_NOT_FOUND";
pub const CALC_PATCH_ROW_INVALID: &str = "CD_CALC_PATCH_ROW_INVALID";
pub const CALC_PATCH_TYPE: &str = "CD_CALC_PATCH_TYPE";

// View blocks.
pub const VIEW_EMPTY_BLOCK: &str = "CD_VIEW_EMPTY_BLOCK";
pub const VIEW_PARSE: &str = "CD_VIEW_PARSE";
pub const VIEW_LIMIT: &str = "CD_VIEW_LIMIT";
pub const VIEW_DISALLOWED_KEY: &str = "CD_VIEW_DISALLOWED_KEY";
pub const VIEW_ITEMS_OBJECT: &str = "CD_VIEW_ITEMS_OBJECT";
pub const VIEW_EXPECT_OBJECT_OR_ARRAY: &str = "CD_VIEW_EXPECT_OBJECT_OR_ARRAY";
pub const VIEW_DUPLICATE_ID: &str = "CD_VIEW_DUPLICATE_ID";
pub const VIEW_UNSUPPORTED_LIBRARY: &str = "CD_VIEW_UNSUPPORTED_LIBRARY";
pub const VIEW_UNKNOWN_TYPE: &str = "CD_VIEW_UNKNOWN_TYPE";
pub const VIEW_SCHEMA_MISSING_ID: &str = "CD_VIEW_SCHEMA_MISSING_ID";
pub const VIEW_SCHEMA_MISSING_SOURCE: &str = "CD_VIEW_SCHEMA_MISSING_SOURCE";
pub const VIEW_SCHEMA_MISSING_SPEC: &str = "CD_VIEW_SCHEMA_MISSING_SPEC";

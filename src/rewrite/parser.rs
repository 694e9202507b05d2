//! Syntax-only parser for Go source files.
//!
//! Files are analyzed standalone: no type checking and no cross-file
//! resolution. The parser validates the file-level structure (package
//! clause, imports, top-level declarations, balanced delimiters, lexical
//! syntax) and extracts the test model.

use std::fs;
use std::path::{Path, PathBuf};

use super::diagnostic::Diagnostic;
use super::lexer::{Keyword, LitKind, Lexer, Span, Symbol, Token, TokenKind};
use super::model::{CallSite, DriverEntry, ImportAnchor, ImportSpec, ParsedFile, TestFunction};
use super::tree::{self, split_on, Delimiter, Group, TokenTree};
use super::{
    ParseError, CONTEXT_TYPE, DEFAULT_DRIVER_IDENT, MAIN_FUNC, MAIN_START_FUNC, RUN_METHOD,
    SUITE_DRIVER_TYPE, TESTING_PACKAGE, TEST_PREFIX,
};

/// Read and parse a file.
pub fn parse_file(path: &Path) -> Result<ParsedFile, ParseError> {
    let source = fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(path, source)
}

/// Parse source text that belongs to `path`.
pub fn parse_source(path: impl Into<PathBuf>, source: String) -> Result<ParsedFile, ParseError> {
    let path = path.into();
    let parts = match parse_parts(&source) {
        Ok(parts) => parts,
        Err(diag) => return Err(ParseError::syntax(path, &diag, &source)),
    };
    Ok(ParsedFile {
        path,
        source,
        package: parts.package,
        imports: parts.imports,
        import_anchor: parts.import_anchor,
        tests: parts.tests,
        driver: parts.driver,
        defines_main: parts.defines_main,
        declarations: parts.declarations,
    })
}

struct FileParts {
    package: String,
    imports: Vec<ImportSpec>,
    import_anchor: ImportAnchor,
    tests: Vec<TestFunction>,
    driver: Option<DriverEntry>,
    defines_main: bool,
    declarations: Vec<String>,
}

/// One top-level declaration and the `;` that ends it.
struct Decl<'t> {
    trees: &'t [TokenTree],
    terminator: Option<&'t Token>,
}

struct FuncDecl<'t> {
    name: &'t str,
    keyword: Span,
    has_receiver: bool,
    params: &'t Group,
    body: Option<&'t Group>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamType {
    /// `*pkg.Name`
    Pointer { package: String, name: String },
    Other,
}

#[derive(Debug, Clone)]
struct Param {
    name: Option<String>,
    ty: ParamType,
}

fn parse_parts(source: &str) -> Result<FileParts, Diagnostic> {
    let tokens = Lexer::new(source).lex_all()?;
    let trees = tree::build(tokens)?;
    let decls = split_decls(&trees)?;
    let mut decls = decls.into_iter();

    let Some(clause) = decls.next() else {
        return Err(Diagnostic::new("expected 'package', found EOF", None));
    };
    let (package, import_anchor) = package_clause(&clause)?;

    let mut imports = Vec::new();
    let mut tests = Vec::new();
    let mut driver = None;
    let mut defines_main = false;
    let mut declarations = Vec::new();
    let mut imports_done = false;

    for decl in decls {
        let head = &decl.trees[0];
        if head.is_keyword(Keyword::Import) {
            if imports_done {
                return Err(Diagnostic::new(
                    "imports must appear before other declarations",
                    Some(head.span()),
                ));
            }
            import_decl(decl.trees, &mut imports)?;
            continue;
        }
        imports_done = true;

        if head.is_keyword(Keyword::Func) {
            let func = func_decl(decl.trees)?;
            if !func.has_receiver {
                declarations.push(func.name.to_string());
            }
            let testing = testing_names(&imports);
            if func.name == MAIN_FUNC && !func.has_receiver {
                defines_main = true;
                if driver.is_none() {
                    driver = driver_entry(&func, &testing);
                }
            }
            if let Some(test) = test_function(&func, &testing) {
                tests.push(test);
            }
            continue;
        }

        let is_gen_decl = head.is_keyword(Keyword::Var)
            || head.is_keyword(Keyword::Const)
            || head.is_keyword(Keyword::Type);
        if !is_gen_decl || decl.trees.len() < 2 {
            return Err(Diagnostic::new(
                "non-declaration statement outside function body",
                Some(head.span()),
            ));
        }
        declared_names(&decl.trees[1..], &mut declarations);
    }

    Ok(FileParts {
        package,
        imports,
        import_anchor,
        tests,
        driver,
        defines_main,
        declarations,
    })
}

/// Names bound by a `var`, `const` or `type` declaration, grouped or not.
fn declared_names(trees: &[TokenTree], out: &mut Vec<String>) {
    if let [group] = trees {
        if let Some(group) = group.group(Delimiter::Paren) {
            for spec in split_on(&group.trees, Symbol::Semi) {
                spec_names(spec, out);
            }
            return;
        }
    }
    spec_names(trees, out);
}

/// Leading `a, b, c` identifier list of one spec.
fn spec_names(spec: &[TokenTree], out: &mut Vec<String>) {
    let mut rest = spec;
    while let [first, tail @ ..] = rest {
        let Some(name) = first.ident() else {
            break;
        };
        if name != "_" {
            out.push(name.to_string());
        }
        match tail {
            [comma, after @ ..] if comma.is_symbol(Symbol::Comma) => rest = after,
            _ => break,
        }
    }
}

/// Names the `testing` package is referenced by. Files that do not import
/// it are matched against the plain package name.
fn testing_names(imports: &[ImportSpec]) -> Vec<&str> {
    let names: Vec<&str> = imports
        .iter()
        .filter(|spec| spec.path == TESTING_PACKAGE)
        .filter_map(ImportSpec::local_name)
        .collect();
    if names.is_empty() {
        vec![TESTING_PACKAGE]
    } else {
        names
    }
}

fn split_decls(trees: &[TokenTree]) -> Result<Vec<Decl<'_>>, Diagnostic> {
    let mut decls = Vec::new();
    let mut start = 0;
    for (idx, tree) in trees.iter().enumerate() {
        if !tree.is_symbol(Symbol::Semi) {
            continue;
        }
        if idx == start {
            return Err(Diagnostic::new("unexpected semicolon", Some(tree.span())));
        }
        decls.push(Decl {
            trees: &trees[start..idx],
            terminator: tree.leaf(),
        });
        start = idx + 1;
    }
    if start < trees.len() {
        return Err(Diagnostic::new(
            "unexpected end of file, expected ';'",
            Some(trees[trees.len() - 1].span()),
        ));
    }
    Ok(decls)
}

fn package_clause(decl: &Decl<'_>) -> Result<(String, ImportAnchor), Diagnostic> {
    let name = match decl.trees {
        [kw, name] if kw.is_keyword(Keyword::Package) => name,
        _ => {
            return Err(Diagnostic::new(
                "expected 'package' clause",
                Some(decl.trees[0].span()),
            ))
        }
    };
    let Some(package) = name.ident() else {
        return Err(Diagnostic::new("expected package name", Some(name.span())));
    };

    let anchor = match decl.terminator {
        Some(semi) if !semi.span.is_empty() => ImportAnchor {
            offset: semi.span.end,
            explicit_semi: true,
        },
        _ => ImportAnchor {
            offset: name.span().end,
            explicit_semi: false,
        },
    };
    Ok((package.to_string(), anchor))
}

fn import_decl(trees: &[TokenTree], out: &mut Vec<ImportSpec>) -> Result<(), Diagnostic> {
    if let [_, group] = trees {
        if let Some(group) = group.group(Delimiter::Paren) {
            for spec in split_on(&group.trees, Symbol::Semi) {
                if !spec.is_empty() {
                    out.push(import_spec(spec)?);
                }
            }
            return Ok(());
        }
    }
    out.push(import_spec(&trees[1..])?);
    Ok(())
}

fn import_spec(spec: &[TokenTree]) -> Result<ImportSpec, Diagnostic> {
    let (name, path) = match spec {
        [path] => (None, path),
        [name, path] => {
            let name = if name.is_symbol(Symbol::Dot) {
                ".".to_string()
            } else {
                match name.ident() {
                    Some(ident) => ident.to_string(),
                    None => {
                        return Err(Diagnostic::new(
                            "expected import name",
                            Some(name.span()),
                        ))
                    }
                }
            };
            (Some(name), path)
        }
        _ => {
            let span = spec.first().map(|t| t.span());
            return Err(Diagnostic::new("expected import path", span));
        }
    };

    let literal = match path.leaf() {
        Some(Token {
            kind: TokenKind::Literal(LitKind::String, text),
            ..
        }) => text,
        _ => return Err(Diagnostic::new("expected import path", Some(path.span()))),
    };
    let unquoted = unquote(literal);
    if unquoted.is_empty() {
        return Err(Diagnostic::new("invalid import path", Some(path.span())));
    }

    Ok(ImportSpec {
        name,
        path: unquoted,
        position: spec[0].span().into(),
    })
}

fn unquote(literal: &str) -> String {
    if let Some(raw) = literal.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return raw.to_string();
    }
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    inner.replace("\\\"", "\"").replace("\\\\", "\\")
}

fn func_decl(trees: &[TokenTree]) -> Result<FuncDecl<'_>, Diagnostic> {
    let keyword = trees[0].span();
    let mut idx = 1;

    let has_receiver = trees
        .get(idx)
        .and_then(|t| t.group(Delimiter::Paren))
        .is_some();
    if has_receiver {
        idx += 1;
    }

    let Some(name) = trees.get(idx).and_then(|t| t.ident()) else {
        return Err(Diagnostic::new("expected function name", Some(keyword)));
    };
    idx += 1;

    // type parameters
    if trees
        .get(idx)
        .and_then(|t| t.group(Delimiter::Bracket))
        .is_some()
    {
        idx += 1;
    }

    let Some(params) = trees.get(idx).and_then(|t| t.group(Delimiter::Paren)) else {
        return Err(Diagnostic::new(
            format!("expected '(' after function name {}", name),
            Some(trees[idx - 1].span()),
        ));
    };
    idx += 1;

    let mut body = None;
    while idx < trees.len() {
        let tree = &trees[idx];
        let anonymous_type =
            tree.is_keyword(Keyword::Struct) || tree.is_keyword(Keyword::Interface);
        if anonymous_type
            && trees
                .get(idx + 1)
                .and_then(|t| t.group(Delimiter::Brace))
                .is_some()
        {
            idx += 2;
            continue;
        }
        if let Some(group) = tree.group(Delimiter::Brace) {
            if idx + 1 != trees.len() {
                return Err(Diagnostic::new(
                    "unexpected tokens after function body",
                    Some(trees[idx + 1].span()),
                ));
            }
            body = Some(group);
        }
        idx += 1;
    }

    Ok(FuncDecl {
        name,
        keyword,
        has_receiver,
        params,
        body,
    })
}

fn params(group: &Group) -> Vec<Param> {
    let segments: Vec<&[TokenTree]> = split_on(&group.trees, Symbol::Comma)
        .into_iter()
        .filter(|seg| !seg.is_empty())
        .collect();

    let named = segments.iter().any(|seg| is_named_segment(seg));
    if !named {
        return segments
            .into_iter()
            .map(|seg| Param {
                name: None,
                ty: param_type(seg),
            })
            .collect();
    }

    let mut out = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for seg in segments {
        if let [single] = seg {
            if let Some(name) = single.ident() {
                pending.push(name.to_string());
                continue;
            }
        }
        let ty = param_type(&seg[1..]);
        for name in pending.drain(..) {
            out.push(Param {
                name: Some(name),
                ty: ty.clone(),
            });
        }
        out.push(Param {
            name: seg[0].ident().map(String::from),
            ty,
        });
    }
    out
}

/// `name Type` as opposed to a bare type such as `pkg.T` or `List[int]`.
fn is_named_segment(seg: &[TokenTree]) -> bool {
    match seg {
        [first, second, rest @ ..] => {
            first.ident().is_some()
                && !second.is_symbol(Symbol::Dot)
                && !(rest.is_empty() && second.group(Delimiter::Bracket).is_some())
        }
        _ => false,
    }
}

fn param_type(ty: &[TokenTree]) -> ParamType {
    match ty {
        [star, package, dot, name] if star.is_symbol(Symbol::Star) && dot.is_symbol(Symbol::Dot) => {
            match (package.ident(), name.ident()) {
                (Some(package), Some(name)) => ParamType::Pointer {
                    package: package.to_string(),
                    name: name.to_string(),
                },
                _ => ParamType::Other,
            }
        }
        _ => ParamType::Other,
    }
}

/// The identifier bound to `*testing.T` / `*testing.M`, and whether it is
/// the suite driver.
fn context_param(params: &[Param], testing: &[&str]) -> Option<(String, bool)> {
    params.iter().find_map(|param| {
        let name = param.name.as_ref()?;
        match &param.ty {
            ParamType::Pointer { package, name: ty } if testing.contains(&package.as_str()) => {
                if ty == CONTEXT_TYPE {
                    Some((name.clone(), false))
                } else if ty == SUITE_DRIVER_TYPE {
                    Some((name.clone(), true))
                } else {
                    None
                }
            }
            _ => None,
        }
    })
}

fn test_function(func: &FuncDecl<'_>, testing: &[&str]) -> Option<TestFunction> {
    if !func.name.starts_with(TEST_PREFIX) {
        return None;
    }
    let body = func.body?;
    let (context_ident, is_suite_entry) = context_param(&params(func.params), testing)?;

    let mut subtests = Vec::new();
    collect_calls(&body.trees, &context_ident, RUN_METHOD, &mut subtests);

    Some(TestFunction {
        name: func.name.to_string(),
        context_ident,
        is_suite_entry,
        start: func.keyword.into(),
        end: body.close.into(),
        subtests,
    })
}

fn driver_entry(func: &FuncDecl<'_>, testing: &[&str]) -> Option<DriverEntry> {
    let body = func.body?;
    let receiver = main_start_binding(&body.trees, testing).unwrap_or_else(|| DEFAULT_DRIVER_IDENT.to_string());

    let mut calls = Vec::new();
    collect_calls(&body.trees, &receiver, RUN_METHOD, &mut calls);
    let run_call = calls.into_iter().next()?;

    Some(DriverEntry {
        function: func.name.to_string(),
        run_call,
    })
}

/// `v := testing.MainStart(...)` → `v`.
fn main_start_binding(trees: &[TokenTree], testing: &[&str]) -> Option<String> {
    for (idx, tree) in trees.iter().enumerate() {
        if let [var, define, package, dot, func, ..] = &trees[idx..] {
            if define.is_symbol(Symbol::Define)
                && package.ident().is_some_and(|p| testing.contains(&p))
                && dot.is_symbol(Symbol::Dot)
                && func.is_ident(MAIN_START_FUNC)
            {
                if let Some(name) = var.ident() {
                    return Some(name.to_string());
                }
            }
        }
        if let TokenTree::Group(group) = tree {
            if let Some(found) = main_start_binding(&group.trees, testing) {
                return Some(found);
            }
        }
    }
    None
}

/// Every `receiver.method(...)` call, outer calls before the calls nested
/// in their arguments. The receiver is matched by its text only.
fn collect_calls(trees: &[TokenTree], receiver: &str, method: &str, out: &mut Vec<CallSite>) {
    for (idx, tree) in trees.iter().enumerate() {
        if let Some(call) = match_call(trees, idx, receiver, method) {
            out.push(call);
        }
        if let TokenTree::Group(group) = tree {
            collect_calls(&group.trees, receiver, method, out);
        }
    }
}

fn match_call(trees: &[TokenTree], idx: usize, receiver: &str, method: &str) -> Option<CallSite> {
    let [recv, dot, name, args, ..] = &trees[idx..] else {
        return None;
    };
    // `x.t.Run` has a selector receiver, not the bound identifier
    let is_selector_tail = idx > 0 && trees[idx - 1].is_symbol(Symbol::Dot);
    if is_selector_tail
        || !recv.is_ident(receiver)
        || !dot.is_symbol(Symbol::Dot)
        || !name.is_ident(method)
    {
        return None;
    }
    let args = args.group(Delimiter::Paren)?;

    let arg_spans = split_on(&args.trees, Symbol::Comma)
        .into_iter()
        .filter_map(|seg| match seg {
            [] => None,
            [first, .., last] => Some(first.span().to(last.span())),
            [only] => Some(only.span()),
        })
        .collect();

    Some(CallSite {
        receiver: receiver.to_string(),
        callee: recv.span().to(name.span()),
        open_paren: args.open,
        close_paren: args.close,
        args: arg_spans,
    })
}

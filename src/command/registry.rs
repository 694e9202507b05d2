//! Flag registries for the wrapped toolchain binaries.
//!
//! Only flags that take a separate value need to be listed: the classifier
//! treats every unlisted flag as boolean, which is how the Go `flag` package
//! parses anything written as `-name` or `-name=value`.

/// Whether a flag takes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagArity {
    /// Boolean flag, no value (e.g., -pack, -std).
    NoValue,
    /// Requires exactly one value (e.g., -o <file>).
    RequiresValue,
}

/// A single flag definition.
#[derive(Debug, Clone, Copy)]
pub struct FlagDef {
    /// Flag name without dashes (e.g., "buildid").
    pub name: &'static str,
    /// Does it take a value?
    pub arity: FlagArity,
    /// Human-readable description (for logs).
    pub description: &'static str,
}

impl FlagDef {
    const fn value(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            arity: FlagArity::RequiresValue,
            description,
        }
    }

    /// Does this definition match the given flag name (dashes stripped)?
    pub fn matches(&self, name: &str) -> bool {
        self.name == name
    }
}

const COMPILE_FLAGS: &[FlagDef] = &[
    FlagDef::value("D", "set relative path for local imports"),
    FlagDef::value("I", "add directory to import search path"),
    FlagDef::value("asmhdr", "write assembly header to file"),
    FlagDef::value("bench", "append benchmark times to file"),
    FlagDef::value("blockprofile", "write block profile to file"),
    FlagDef::value("buildid", "record id as the build id in the export metadata"),
    FlagDef::value("c", "concurrency during compilation"),
    FlagDef::value("coveragecfg", "read coverage configuration from file"),
    FlagDef::value("cpuprofile", "write cpu profile to file"),
    FlagDef::value("d", "enable debugging settings"),
    FlagDef::value("embedcfg", "read go:embed configuration from file"),
    FlagDef::value("env", "add definition of the form key=value to environment"),
    FlagDef::value("gendwarfinl", "generate DWARF inline info records"),
    FlagDef::value("goversion", "required version of the runtime"),
    FlagDef::value("importcfg", "read import configuration from file"),
    FlagDef::value("installsuffix", "set pkg directory suffix"),
    FlagDef::value("json", "version,file for JSON compiler/optimizer detail output"),
    FlagDef::value("lang", "Go language version source code expects"),
    FlagDef::value("linkobj", "write linker-specific object to file"),
    FlagDef::value("memprofile", "write memory profile to file"),
    FlagDef::value("memprofilerate", "set runtime.MemProfileRate to rate"),
    FlagDef::value("mutexprofile", "write mutex profile to file"),
    FlagDef::value("o", "write output to file"),
    FlagDef::value("p", "set expected package import path"),
    FlagDef::value("pgoprofile", "read profile from file"),
    FlagDef::value("spectre", "enable spectre mitigations in list"),
    FlagDef::value("symabis", "read symbol ABIs from file"),
    FlagDef::value("traceprofile", "write an execution trace to file"),
    FlagDef::value("trimpath", "remove prefix from recorded source file paths"),
];

const LINK_FLAGS: &[FlagDef] = &[
    FlagDef::value("B", "add an ELF NT_GNU_BUILD_ID note"),
    FlagDef::value("E", "set entry symbol name"),
    FlagDef::value("H", "set header type"),
    FlagDef::value("I", "use linker as ELF dynamic linker"),
    FlagDef::value("L", "add specified directory to library path"),
    FlagDef::value("R", "set address rounding quantum"),
    FlagDef::value("T", "set the start address of text symbols"),
    FlagDef::value("X", "add string value definition of the form importpath.name=value"),
    FlagDef::value("benchmark", "set to 'mem' or 'cpu' to enable phase benchmarking"),
    FlagDef::value("benchmarkprofile", "emit phase profiles to base"),
    FlagDef::value("buildid", "record id as Go toolchain build id"),
    FlagDef::value("buildmode", "set build mode"),
    FlagDef::value("cpuprofile", "write cpu profile to file"),
    FlagDef::value("debugtextsize", "debug text section max size"),
    FlagDef::value("debugtramp", "debug trampolines"),
    FlagDef::value("extar", "archive program for buildmode=c-archive"),
    FlagDef::value("extld", "use linker when linking in external mode"),
    FlagDef::value("extldflags", "pass flags to external linker"),
    FlagDef::value("importcfg", "read import configuration from file"),
    FlagDef::value("installsuffix", "set package directory suffix"),
    FlagDef::value("k", "set field tracking symbol"),
    FlagDef::value("libgcc", "compiler support lib for internal linking"),
    FlagDef::value("linkmode", "set link mode"),
    FlagDef::value("memprofile", "write memory profile to file"),
    FlagDef::value("memprofilerate", "set runtime.MemProfileRate to rate"),
    FlagDef::value("o", "write output to file"),
    FlagDef::value("pluginpath", "full path name for plugin"),
    FlagDef::value("r", "set the ELF dynamic linker search path"),
    FlagDef::value("strictdups", "sanity check duplicate symbol contents"),
    FlagDef::value("tmpdir", "use directory for temporary files"),
];

/// Flags of `go tool compile` that take a separate value.
pub fn compile_flags() -> &'static [FlagDef] {
    COMPILE_FLAGS
}

/// Flags of `go tool link` that take a separate value.
pub fn link_flags() -> &'static [FlagDef] {
    LINK_FLAGS
}

/// Look up a flag by name (dashes stripped).
pub fn lookup<'a>(registry: &'a [FlagDef], name: &str) -> Option<&'a FlagDef> {
    registry.iter().find(|d| d.matches(name))
}

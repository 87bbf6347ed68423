use std::sync::Arc;

use footprints::{Collector, FootprintError, Instance, Report, Verdict};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_pick(report: &Report, built: &Result<Option<Arc<Instance>>, FootprintError>, color: bool) {
    let palette = ansi::Palette::new(color);
    println!(
        "\n{} {}",
        palette.bold(palette.paint(format!("⚙  Picking: {}", report.tag), ansi::CYAN)),
        palette.dim(format!("[{}]", report.keys.join(", ")))
    );

    println!("\n{}", palette.paint("━━━ Candidates ━━━", ansi::GRAY));
    if report.candidates.is_empty() {
        println!("{}", palette.dim("  No candidate evaluated"));
    }
    print_candidates(report, &palette);

    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    match built {
        Ok(Some(instance)) => print_instance(instance, &palette),
        Ok(None) => {
            println!("{}", palette.dim("  No match"));
            println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
            println!("  • A mandatory attribute is missing from the description");
            println!("  • A value is outside the declared values or outcast");
            println!("  • An `only` rule needs an ambient default (see --default)");
            println!("\n{}", palette.dim("  Tip: Set FOOTPRINTS_LOG=footprints=debug to trace every resolution step"));
        }
        Err(err) => println!("  {} {}", palette.paint("error:", ansi::RED), err),
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!("  Total: {}", palette.paint(format!("{:?}", report.total), ansi::GREEN));
    println!();
}

fn print_candidates(report: &Report, palette: &ansi::Palette) {
    for (idx, entry) in report.candidates.iter().enumerate() {
        let verdict = match &entry.verdict {
            Verdict::Selected => palette.bold(palette.paint("✓ selected", ansi::GREEN)),
            Verdict::Eligible => palette.paint("✓ eligible", ansi::CYAN),
            Verdict::Rejected => palette.paint("✗ rejected", ansi::YELLOW),
            Verdict::Error(msg) => palette.paint(format!("✗ error: {msg}"), ansi::RED),
        };
        println!(
            "  {} {} {} {} {}",
            palette.paint(format!("[{}]", idx), ansi::GRAY),
            palette.paint(&entry.candidate, ansi::BLUE),
            palette.dim(format!("level {}", entry.level)),
            palette.dim("│"),
            verdict,
        );
        if !entry.input_attrs.is_empty() {
            println!("      {} {}", palette.dim("input:"), entry.input_attrs.join(", "));
        }
        for diag in &entry.diagnostics {
            println!("      {} {}", palette.paint("•", ansi::YELLOW), palette.dim(diag.to_string()));
        }
    }
}

fn print_instance(instance: &Instance, palette: &ansi::Palette) {
    let candidate = instance.candidate();
    println!(
        "  {} {}",
        palette.bold(palette.paint(candidate.name(), ansi::GREEN)),
        palette.dim(format!("({})", candidate.info()))
    );
    let attrs = instance.attributes();
    for name in candidate.footprint().attr_names() {
        match attrs.get(name) {
            Some(value) => println!("      {} = {}", palette.paint(name, ansi::BLUE), value),
            None => println!("      {} = {}", palette.paint(name, ansi::BLUE), palette.dim("<unknown>")),
        }
    }
}

pub fn print_map(collector: &Collector, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Attribute map: {}", collector.tag()), ansi::CYAN)));

    for (name, entries) in collector.attribute_map() {
        println!("\n{}", palette.paint(format!("━━━ {name} ━━━"), ansi::GRAY));
        for entry in entries {
            let values = entry.values.iter().map(ToString::to_string).collect::<Vec<_>>();
            let outcast = entry.outcast.iter().map(ToString::to_string).collect::<Vec<_>>();
            println!(
                "  {} {}{}{}",
                palette.paint(&entry.candidate, ansi::BLUE),
                if entry.optional { palette.dim("optional") } else { palette.paint("mandatory", ansi::YELLOW) },
                if values.is_empty() { String::new() } else { format!("  values: {}", values.join(", ")) },
                if outcast.is_empty() { String::new() } else { palette.dim(format!("  outcast: {}", outcast.join(", "))) },
            );
        }
    }
    println!();
}

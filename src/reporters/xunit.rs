//! xUnit report: results grouped as test type → package → data stream → case.
//!
//! Suites are emitted in lexical order of their names; cases keep the order
//! the runner produced them in. Every test-type suite carries the counts of
//! the whole run, not just its own subtree.

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::{Context, Result, bail};

use crate::models::{NodeKind, SuiteCounts, TestResult, TestTree};

const HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const INDENT: &str = "  ";

type Grouped<'a> = BTreeMap<&'a str, BTreeMap<&'a str, BTreeMap<&'a str, Vec<&'a TestResult>>>>;

pub fn report(results: &[TestResult]) -> Result<String> {
    let tree = build_tree(results);
    let mut out = String::from(HEADER);
    write_document(&tree, &mut out).context("unable to format test results as xUnit")?;
    Ok(out)
}

fn build_tree(results: &[TestResult]) -> TestTree<'_> {
    let mut grouped: Grouped<'_> = BTreeMap::new();
    let mut counts = SuiteCounts::default();

    for r in results {
        counts.tests += 1;
        if !r.failure_msg.is_empty() {
            counts.failures += 1;
        }
        if !r.error_msg.is_empty() {
            counts.errors += 1;
        }
        grouped
            .entry(r.test_type.as_str())
            .or_default()
            .entry(r.package.as_str())
            .or_default()
            .entry(r.data_stream.as_str())
            .or_default()
            .push(r);
    }

    let mut tree = TestTree::new();
    for (test_type, packages) in grouped {
        let type_id = tree.add_root(NodeKind::TestType, test_type.to_string());
        tree.set_counts(type_id, counts);
        for (package, data_streams) in packages {
            let package_id = tree.add_child(type_id, NodeKind::Package, package.to_string());
            for (data_stream, cases) in data_streams {
                let ds_id = tree.add_child(package_id, NodeKind::DataStream, data_stream.to_string());
                for case in cases {
                    tree.add_case(ds_id, case);
                }
            }
        }
    }
    tree
}

fn write_document(tree: &TestTree<'_>, out: &mut String) -> Result<()> {
    out.push_str("<testsuites>\n");
    for &root in tree.roots() {
        write_node(tree, root, 1, out)?;
    }
    out.push_str("</testsuites>");
    Ok(())
}

fn write_node(tree: &TestTree<'_>, id: usize, depth: usize, out: &mut String) -> Result<()> {
    let Some(node) = tree.get(id) else {
        bail!("dangling report node {}", id);
    };
    let pad = INDENT.repeat(depth);

    if node.kind == NodeKind::Case {
        let Some(result) = node.result else {
            bail!("test case node {} has no result", node.name);
        };
        return write_case(result, &pad, out);
    }

    write!(out, "{}<testsuite name=\"{}\"", pad, escape_attr(&node.name))?;
    if let Some(counts) = node.counts {
        for (attr, value) in [
            ("tests", counts.tests),
            ("failures", counts.failures),
            ("errors", counts.errors),
        ] {
            if value > 0 {
                write!(out, " {}=\"{}\"", attr, value)?;
            }
        }
    }
    out.push_str(">\n");

    let comment = match node.kind {
        NodeKind::TestType => format!("test suite for {} tests", node.name),
        NodeKind::Package => format!("test suite for package: {}", node.name),
        _ => format!("test suite for data stream: {}", node.name),
    };
    write_comment(&comment, &format!("{}{}", pad, INDENT), out)?;

    for &child in &node.children {
        write_node(tree, child, depth + 1, out)?;
    }
    writeln!(out, "{}</testsuite>", pad)?;
    Ok(())
}

fn write_case(result: &TestResult, pad: &str, out: &mut String) -> Result<()> {
    write!(
        out,
        "{}<testcase name=\"{}\" classname=\"{}.{}\" time=\"{:.3}\"",
        pad,
        escape_attr(&result.name),
        escape_attr(&result.package),
        escape_attr(&result.data_stream),
        result.time_elapsed.as_secs_f64()
    )?;

    let failure = result.failure_text();
    if result.error_msg.is_empty() && failure.is_empty() {
        out.push_str("></testcase>\n");
        return Ok(());
    }

    out.push_str(">\n");
    if !result.error_msg.is_empty() {
        writeln!(
            out,
            "{}{}<error>{}</error>",
            pad,
            INDENT,
            escape_text(&result.error_msg)
        )?;
    }
    if !failure.is_empty() {
        writeln!(out, "{}{}<failure>{}</failure>", pad, INDENT, escape_text(&failure))?;
    }
    writeln!(out, "{}</testcase>", pad)?;
    Ok(())
}

fn write_comment(comment: &str, pad: &str, out: &mut String) -> Result<()> {
    if comment.contains("--") || comment.ends_with('-') {
        bail!("comments must not contain \"--\": {}", comment);
    }
    let comment: String = comment
        .chars()
        .map(|c| if is_xml_char(c) { c } else { '\u{FFFD}' })
        .collect();
    writeln!(out, "{}<!--{}-->", pad, comment)?;
    Ok(())
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\r' => out.push_str("&#xD;"),
            c if !is_xml_char(c) => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

/// Characters allowed in an XML 1.0 document.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

fn escape_attr(s: &str) -> String {
    escape_text(s)
        .replace('\n', "&#xA;")
        .replace('\t', "&#x9;")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::TestType;

    fn result(package: &str, data_stream: &str, name: &str) -> TestResult {
        let mut r = TestResult::new(TestType::pipeline(), package, data_stream);
        r.name = name.to_string();
        r.time_elapsed = Duration::from_millis(12);
        r
    }

    fn sample() -> Vec<TestResult> {
        let mut failed = result("pkg", "ds", "case2");
        failed.failure_msg = "test case failed".into();
        failed.failure_details = "event 0 differs".into();
        vec![result("pkg", "ds", "case1"), failed]
    }

    #[test]
    fn renders_nested_suites() {
        let out = report(&sample()).unwrap();
        let expected = "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<testsuites>
  <testsuite name=\"pipeline\" tests=\"2\" failures=\"1\">
    <!--test suite for pipeline tests-->
    <testsuite name=\"pkg\">
      <!--test suite for package: pkg-->
      <testsuite name=\"ds\">
        <!--test suite for data stream: ds-->
        <testcase name=\"case1\" classname=\"pkg.ds\" time=\"0.012\"></testcase>
        <testcase name=\"case2\" classname=\"pkg.ds\" time=\"0.012\">
          <failure>test case failed: event 0 differs</failure>
        </testcase>
      </testsuite>
    </testsuite>
  </testsuite>
</testsuites>";
        assert_eq!(out, expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut results = sample();
        results.push(result("zeta", "b", "x"));
        results.push(result("alpha", "a", "y"));
        results.push(result("zeta", "a", "z"));
        assert_eq!(report(&results).unwrap(), report(&results).unwrap());
    }

    #[test]
    fn cases_keep_execution_order_within_data_stream() {
        let results = vec![
            result("pkg", "ds", "b"),
            result("other", "ds", "x"),
            result("pkg", "ds", "a"),
        ];
        let out = report(&results).unwrap();
        let b = out.find("name=\"b\"").unwrap();
        let a = out.find("name=\"a\"").unwrap();
        assert!(b < a);
    }

    #[test]
    fn counts_are_global_on_every_test_type() {
        let mut errored = result("pkg", "ds", "c");
        errored.test_type = TestType::new("static");
        errored.error_msg = "boom".into();
        let mut results = sample();
        results.push(errored);

        let out = report(&results).unwrap();
        let suites: Vec<_> = out
            .lines()
            .filter(|l| l.starts_with("  <testsuite "))
            .collect();
        assert_eq!(
            suites,
            vec![
                "  <testsuite name=\"pipeline\" tests=\"3\" failures=\"1\" errors=\"1\">",
                "  <testsuite name=\"static\" tests=\"3\" failures=\"1\" errors=\"1\">",
            ]
        );
        assert!(out.contains("<error>boom</error>"));
    }

    #[test]
    fn text_is_escaped() {
        let mut r = result("pkg", "ds", "a<b>");
        r.error_msg = "expected \"x\" & got <y>".into();
        let out = report(&[r]).unwrap();
        assert!(out.contains("name=\"a&lt;b&gt;\""));
        assert!(out.contains("<error>expected &#34;x&#34; &amp; got &lt;y&gt;</error>"));
    }

    #[test]
    fn control_characters_become_replacement_chars() {
        let mut r = result("pkg", "ds", "a\u{0}b");
        r.error_msg = "boom \u{1b}[31m \u{0}".into();
        let out = report(&[r]).unwrap();
        assert!(out.contains("name=\"a\u{FFFD}b\""));
        assert!(out.contains("<error>boom \u{FFFD}[31m \u{FFFD}</error>"));
        assert!(!out.contains('\u{1b}'));
        assert!(!out.contains('\u{0}'));
    }

    #[test]
    fn invalid_comment_is_a_format_error() {
        let out = report(&[result("my--pkg", "ds", "a")]);
        let err = out.unwrap_err();
        assert_eq!(err.to_string(), "unable to format test results as xUnit");
    }

    #[test]
    fn empty_results_render_empty_document() {
        assert_eq!(report(&[]).unwrap(), format!("{}<testsuites>\n</testsuites>", HEADER));
    }
}

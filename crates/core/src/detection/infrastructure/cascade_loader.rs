//! Reads OpenCV cascade XML into a [`HaarCascade`].
//!
//! Two layouts exist in the wild:
//!
//! - the current one (`<cascade>` with `stages`/`weakClassifiers` and a
//!   shared `features` list referenced by index), written by
//!   `opencv_traincascade`;
//! - the legacy one (`type_id="opencv-haar-classifier"` with `trees` whose
//!   nodes carry their own feature and `left_val`/`left_node` children),
//!   still used by many community cascades.
//!
//! Both are normalised into the same tree representation.

use std::path::Path;

use roxmltree::{Document, Node};

use crate::shared::error::VisionError;

use super::haar_cascade::{HaarCascade, HaarFeature, Stage, TreeNode, WeakClassifier, WeightedRect};

/// Loads and validates a cascade file.
pub fn load_cascade(path: &Path) -> Result<HaarCascade, VisionError> {
    let xml = std::fs::read_to_string(path)
        .map_err(|e| VisionError::DetectorUnavailable(format!("{}: {e}", path.display())))?;
    parse_cascade(&xml)
}

pub fn parse_cascade(xml: &str) -> Result<HaarCascade, VisionError> {
    let doc = Document::parse(xml).map_err(|e| format_error(format!("malformed XML: {e}")))?;
    let root = doc.root_element();
    let cascade = elements(root)
        .next()
        .ok_or_else(|| format_error("no cascade element under the document root"))?;

    let parsed = if child(cascade, "size").is_ok() {
        parse_legacy(cascade)?
    } else {
        parse_current(cascade)?
    };
    parsed.validate()?;
    Ok(parsed)
}

fn parse_current(cascade: Node) -> Result<HaarCascade, VisionError> {
    let width = parse_usize(child(cascade, "width")?)?;
    let height = parse_usize(child(cascade, "height")?)?;

    let features = list(child(cascade, "features")?)
        .map(parse_feature)
        .collect::<Result<Vec<_>, _>>()?;

    let mut stages = Vec::new();
    for stage in list(child(cascade, "stages")?) {
        let threshold = parse_f64(child(stage, "stageThreshold")?)?;
        let mut classifiers = Vec::new();
        for weak in list(child(stage, "weakClassifiers")?) {
            let internal = numbers(child(weak, "internalNodes")?)?;
            if internal.is_empty() || internal.len() % 4 != 0 {
                return Err(format_error(format!(
                    "internalNodes has {} values, expected groups of 4",
                    internal.len()
                )));
            }
            let nodes = internal
                .chunks_exact(4)
                .map(|n| -> Result<TreeNode, VisionError> {
                    Ok(TreeNode {
                        left: as_int(n[0])?,
                        right: as_int(n[1])?,
                        feature: as_index(n[2])?,
                        threshold: n[3],
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let leaves = numbers(child(weak, "leafValues")?)?;
            classifiers.push(WeakClassifier { nodes, leaves });
        }
        stages.push(Stage {
            threshold,
            classifiers,
        });
    }

    Ok(HaarCascade {
        window: (width, height),
        stages,
        features,
    })
}

fn parse_legacy(cascade: Node) -> Result<HaarCascade, VisionError> {
    let size = numbers(child(cascade, "size")?)?;
    let [w, h] = size[..] else {
        return Err(format_error("size must hold two values"));
    };
    let window = (as_index(w)?, as_index(h)?);

    let mut features = Vec::new();
    let mut stages = Vec::new();
    for stage in list(child(cascade, "stages")?) {
        let threshold = parse_f64(child(stage, "stage_threshold")?)?;
        let mut classifiers = Vec::new();
        for tree in list(child(stage, "trees")?) {
            let mut nodes = Vec::new();
            let mut leaves = Vec::new();
            for node in list(tree) {
                features.push(parse_feature(child(node, "feature")?)?);
                let feature = features.len() - 1;
                let threshold = parse_f64(child(node, "threshold")?)?;
                let left = legacy_child(node, "left_node", "left_val", &mut leaves)?;
                let right = legacy_child(node, "right_node", "right_val", &mut leaves)?;
                nodes.push(TreeNode {
                    feature,
                    threshold,
                    left,
                    right,
                });
            }
            classifiers.push(WeakClassifier { nodes, leaves });
        }
        stages.push(Stage {
            threshold,
            classifiers,
        });
    }

    Ok(HaarCascade {
        window,
        stages,
        features,
    })
}

/// A node link: a positive node index, or a freshly appended leaf.
fn legacy_child(
    node: Node,
    node_tag: &str,
    leaf_tag: &str,
    leaves: &mut Vec<f64>,
) -> Result<i32, VisionError> {
    if let Ok(link) = child(node, node_tag) {
        let index = as_int(parse_f64(link)?)?;
        if index <= 0 {
            return Err(format_error(format!("{node_tag} must be positive, got {index}")));
        }
        return Ok(index);
    }
    leaves.push(parse_f64(child(node, leaf_tag)?)?);
    Ok(-(leaves.len() as i32 - 1))
}

fn parse_feature(feature: Node) -> Result<HaarFeature, VisionError> {
    let rects = list(child(feature, "rects")?)
        .map(|r| {
            let v = numbers(r)?;
            let [x, y, width, height, weight] = v[..] else {
                return Err(format_error(format!(
                    "feature rectangle has {} values, expected 5",
                    v.len()
                )));
            };
            Ok(WeightedRect {
                x: as_int(x)?,
                y: as_int(y)?,
                width: as_int(width)?,
                height: as_int(height)?,
                weight,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let tilted = match child(feature, "tilted") {
        Ok(t) => parse_f64(t)? != 0.0,
        Err(_) => false,
    };
    Ok(HaarFeature { rects, tilted })
}

// ── XML helpers ──────────────────────────────────────────────────────

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// OpenCV sequences are runs of `<_>` elements.
fn list<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    elements(node).filter(|n| n.has_tag_name("_"))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, VisionError> {
    elements(node)
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| format_error(format!("<{}> has no <{name}>", node.tag_name().name())))
}

fn numbers(node: Node) -> Result<Vec<f64>, VisionError> {
    node.text()
        .unwrap_or_default()
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| format_error(format!("invalid number {tok:?} in <{}>", node.tag_name().name())))
        })
        .collect()
}

fn parse_f64(node: Node) -> Result<f64, VisionError> {
    match numbers(node)?[..] {
        [v] => Ok(v),
        _ => Err(format_error(format!(
            "<{}> must hold a single number",
            node.tag_name().name()
        ))),
    }
}

fn parse_usize(node: Node) -> Result<usize, VisionError> {
    as_index(parse_f64(node)?)
}

fn as_int(v: f64) -> Result<i32, VisionError> {
    if v.fract() != 0.0 || v < i32::MIN as f64 || v > i32::MAX as f64 {
        return Err(format_error(format!("expected an integer, got {v}")));
    }
    Ok(v as i32)
}

fn as_index(v: f64) -> Result<usize, VisionError> {
    let i = as_int(v)?;
    usize::try_from(i).map_err(|_| format_error(format!("expected a non-negative index, got {i}")))
}

fn format_error(msg: impl Into<String>) -> VisionError {
    VisionError::CascadeFormat(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::haar_cascade::tests::edge_cascade;
    use std::io::Write;

    const CURRENT_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>12</height>
  <width>12</width>
  <stageNum>1</stageNum>
  <stages>
    <!-- stage 0 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>5.0000000000000000e-01</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000000000001e-01</internalNodes>
          <leafValues>
            0. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 6 12 -1.</_>
        <_>
          6 0 6 12 1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

    const LEGACY_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<edge_cascade type_id="opencv-haar-classifier">
  <size>12 12</size>
  <stages>
    <_>
      <!-- stage 0 -->
      <trees>
        <_>
          <!-- tree 0 -->
          <_>
            <!-- root node -->
            <feature>
              <rects>
                <_>0 0 6 12 -1.</_>
                <_>6 0 6 12 1.</_></rects>
              <tilted>0</tilted></feature>
            <threshold>0.1</threshold>
            <left_val>0.</left_val>
            <right_val>1.</right_val></_></_></trees>
      <stage_threshold>0.5</stage_threshold>
      <parent>-1</parent>
      <next>-1</next></_></stages></edge_cascade>
</opencv_storage>
"#;

    #[test]
    fn test_current_layout_parses() {
        assert_eq!(parse_cascade(CURRENT_XML).unwrap(), edge_cascade());
    }

    #[test]
    fn test_legacy_layout_parses_to_same_cascade() {
        assert_eq!(parse_cascade(LEGACY_XML).unwrap(), edge_cascade());
    }

    #[test]
    fn test_legacy_node_links_and_tilted_features() {
        let xml = r#"<opencv_storage><c type_id="opencv-haar-classifier">
  <size>20 20</size>
  <stages><_><trees><_>
    <_>
      <feature><rects><_>4 2 6 4 -1.</_><_>8 4 2 2 2.</_></rects><tilted>1</tilted></feature>
      <threshold>-0.02</threshold>
      <left_node>1</left_node>
      <right_val>0.7</right_val></_>
    <_>
      <feature><rects><_>0 0 10 10 -1.</_><_>0 0 5 5 4.</_></rects><tilted>0</tilted></feature>
      <threshold>0.3</threshold>
      <left_val>-0.4</left_val>
      <right_val>0.9</right_val></_>
  </_></trees><stage_threshold>0.1</stage_threshold></_></stages>
</c></opencv_storage>"#;
        let cascade = parse_cascade(xml).unwrap();
        assert_eq!(cascade.window, (20, 20));
        assert!(cascade.has_tilted());
        let tree = &cascade.stages[0].classifiers[0];
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.nodes[0].left, 1);
        assert_eq!(tree.nodes[0].right, 0);
        assert_eq!(tree.nodes[1].left, -1);
        assert_eq!(tree.nodes[1].right, -2);
        assert_eq!(tree.leaves, vec![0.7, -0.4, 0.9]);
        assert_eq!(tree.nodes[1].feature, 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CURRENT_XML.as_bytes()).unwrap();
        let cascade = load_cascade(file.path()).unwrap();
        assert_eq!(cascade.window, (12, 12));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = load_cascade(Path::new("/nonexistent/cascade.xml")).unwrap_err();
        assert!(matches!(err, VisionError::DetectorUnavailable(_)));
    }

    #[test]
    fn test_malformed_xml_is_format_error() {
        let err = parse_cascade("<opencv_storage><cascade>").unwrap_err();
        assert!(matches!(err, VisionError::CascadeFormat(_)));
    }

    #[test]
    fn test_bad_number_is_format_error() {
        let xml = CURRENT_XML.replace("<width>12</width>", "<width>twelve</width>");
        assert!(matches!(parse_cascade(&xml), Err(VisionError::CascadeFormat(_))));
    }

    #[test]
    fn test_truncated_internal_nodes_rejected() {
        let xml = CURRENT_XML.replace("0 -1 0 1.0000000000000001e-01", "0 -1 0");
        assert!(matches!(parse_cascade(&xml), Err(VisionError::CascadeFormat(_))));
    }

    #[test]
    fn test_out_of_range_feature_index_rejected() {
        let xml = CURRENT_XML.replace("0 -1 0 1.0000000000000001e-01", "0 -1 3 0.1");
        assert!(matches!(parse_cascade(&xml), Err(VisionError::CascadeFormat(_))));
    }
}

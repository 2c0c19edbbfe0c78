//! Hierarchical markup sources: UN consolidated list, Canada SEMA, Switzerland SECO

use super::{join_present, present, pseudo_id, FragmentSink, SourceFile};
use crate::error::{Result, ScreeningError};
use crate::types::EntityFragment;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const UN_NAME_FIELDS: &[&str] = &["FIRST_NAME", "SECOND_NAME", "THIRD_NAME", "FOURTH_NAME"];
const UN_ADDRESS_FIELDS: &[&str] = &["STREET", "CITY", "STATE_PROVINCE", "COUNTRY"];

/// Element of a parsed markup document.
///
/// Namespace prefixes are dropped from element and attribute names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a document and return its root element. Invalid UTF-8 is replaced.
    pub fn parse(bytes: &[u8]) -> Result<XmlNode> {
        let decoded = String::from_utf8_lossy(bytes);
        let mut reader = Reader::from_str(&decoded);
        reader.config_mut().trim_text(true);

        // synthetic document node at the bottom of the stack
        let mut stack = vec![XmlNode::default()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(Self::open(&e)?),
                Ok(Event::Empty(e)) => {
                    let node = Self::open(&e)?;
                    Self::attach(&mut stack, node);
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err(ScreeningError::Malformed("unbalanced closing tag".to_string()));
                    }
                    if let Some(node) = stack.pop() {
                        Self::attach(&mut stack, node);
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape()?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ScreeningError::Malformed(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        if stack.len() != 1 {
            return Err(ScreeningError::Malformed(format!(
                "document ended with {} unclosed element(s)",
                stack.len() - 1
            )));
        }

        stack
            .pop()
            .and_then(|document| document.children.into_iter().next())
            .ok_or_else(|| ScreeningError::Malformed("document has no root element".to_string()))
    }

    fn open(start: &BytesStart<'_>) -> Result<XmlNode> {
        let mut node = XmlNode::new(String::from_utf8_lossy(start.local_name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    fn attach(stack: &mut [XmlNode], node: XmlNode) {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| present(value))
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Trimmed text of this element, absent when empty or a sentinel
    pub fn value(&self) -> Option<&str> {
        present(&self.text)
    }

    /// Text of the first direct child called `name`
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlNode::value)
    }

    /// All elements called `name` below this one, in document order
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a XmlNode> {
        let mut found = Vec::new();
        let mut pending: Vec<&XmlNode> = self.children.iter().rev().collect();
        while let Some(node) = pending.pop() {
            if node.name == name {
                found.push(node);
            }
            pending.extend(node.children.iter().rev());
        }
        found
    }
}

pub(crate) fn normalize(file: SourceFile, document: &XmlNode) -> Vec<EntityFragment> {
    let mut sink = FragmentSink::new();
    let list = file.source_list();

    match file {
        SourceFile::UnConsolidated => un(list, document, &mut sink),
        SourceFile::CaSema => sema(list, document, &mut sink),
        SourceFile::ChSeco => seco(list, document, &mut sink),
        _ => {}
    }

    sink.into_fragments()
}

fn un_aliases(list: &str, id: &str, node: &XmlNode, alias_element: &str, sink: &mut FragmentSink) {
    for alias in node.descendants(alias_element) {
        if let Some(name) = alias.child_text("ALIAS_NAME") {
            sink.alias(list, id, name);
        }
    }
}

fn un(list: &str, document: &XmlNode, sink: &mut FragmentSink) {
    for individual in document.descendants("INDIVIDUAL") {
        let Some(id) = individual.child_text("DATAID") else {
            continue;
        };
        let parts = UN_NAME_FIELDS.iter().map(|field| individual.child_text(field));
        let Some(name) = join_present(parts, " ") else {
            continue;
        };

        sink.primary(list, id, &name);
        un_aliases(list, id, individual, "INDIVIDUAL_ALIAS", sink);
        if let Some(list_type) = individual.child_text("UN_LIST_TYPE") {
            sink.program(list, id, &format!("UN: {}", list_type));
        }
        for nationality in individual.descendants("NATIONALITY") {
            for value in nationality.children_named("VALUE").filter_map(XmlNode::value) {
                sink.address(list, id, &format!("Nationality: {}", value));
            }
        }
    }

    for entity in document.descendants("ENTITY") {
        let Some(id) = entity.child_text("DATAID") else {
            continue;
        };
        let Some(name) = entity.child_text("FIRST_NAME") else {
            continue;
        };

        sink.primary(list, id, name);
        un_aliases(list, id, entity, "ENTITY_ALIAS", sink);
        if let Some(list_type) = entity.child_text("UN_LIST_TYPE") {
            sink.program(list, id, &format!("UN: {}", list_type));
        }
        for address in entity.descendants("ENTITY_ADDRESS") {
            let parts = UN_ADDRESS_FIELDS.iter().map(|field| address.child_text(field));
            if let Some(address) = join_present(parts, ", ") {
                sink.address(list, id, &address);
            }
        }
    }
}

fn sema(list: &str, document: &XmlNode, sink: &mut FragmentSink) {
    for record in document.descendants("record") {
        let name = record
            .child_text("Entity")
            .or_else(|| record.child_text("EntityOrShip"))
            .map(str::to_string)
            .or_else(|| {
                join_present([record.child_text("GivenName"), record.child_text("LastName")], " ")
            });
        let Some(name) = name else {
            continue;
        };
        let id = record
            .child_text("Item")
            .map(str::to_string)
            .unwrap_or_else(|| pseudo_id(list, &name));

        sink.primary(list, &id, &name);
        if let Some(aliases) = record.child("Aliases") {
            for alias in aliases.children_named("Alias").filter_map(XmlNode::value) {
                sink.alias(list, &id, alias);
            }
        }
        if let Some(schedule) = record.child_text("Schedule") {
            sink.program(list, &id, &format!("CA: {}", schedule));
        }
        if let Some(born) = record.child_text("DateOfBirth") {
            sink.address(list, &id, &format!("DOB: {}", born));
        }
    }
}

fn seco(list: &str, document: &XmlNode, sink: &mut FragmentSink) {
    for target in document.descendants("target") {
        let Some(ssid) = target.attribute("ssid") else {
            continue;
        };
        for identity in target.descendants("identity") {
            for name in identity.descendants("name") {
                let parts = name
                    .descendants("name-part")
                    .into_iter()
                    .map(|part| part.child_text("value"));
                if let Some(full_name) = join_present(parts, " ") {
                    sink.primary(list, ssid, &full_name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FragmentAttribute;

    fn fragments(file: SourceFile, xml: &str) -> Vec<EntityFragment> {
        normalize(file, &XmlNode::parse(xml.as_bytes()).unwrap())
    }

    #[test]
    fn test_parse_tree() {
        let root = XmlNode::parse(
            br#"<?xml version="1.0"?>
            <ss:list xmlns:ss="urn:x"><ss:item id="7">A &amp; B</ss:item><empty/><![CDATA[raw]]></ss:list>"#,
        )
        .unwrap();

        assert_eq!(root.name, "list");
        assert_eq!(root.text, "raw");
        assert_eq!(root.child_text("item"), Some("A & B"));
        assert_eq!(root.child("item").and_then(|n| n.attribute("id")), Some("7"));
        assert!(root.child("empty").is_some());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(XmlNode::parse(b"<a><b></a>").is_err());
        assert!(XmlNode::parse(b"<a><b>").is_err());
        assert!(XmlNode::parse(b"").is_err());
    }

    #[test]
    fn test_descendants_document_order() {
        let root = XmlNode::parse(b"<r><x n='1'><x n='2'/></x><y><x n='3'/></y></r>").unwrap();
        let order: Vec<_> = root.descendants("x").iter().filter_map(|n| n.attribute("n")).collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_un_individuals_and_entities() {
        let xml = r#"<CONSOLIDATED_LIST>
          <INDIVIDUALS>
            <INDIVIDUAL>
              <DATAID>6908555</DATAID>
              <FIRST_NAME>AYMAN</FIRST_NAME><SECOND_NAME>MUHAMMED</SECOND_NAME>
              <THIRD_NAME>RABI</THIRD_NAME><FOURTH_NAME/>
              <UN_LIST_TYPE>Al-Qaida</UN_LIST_TYPE>
              <NATIONALITY><VALUE>Egypt</VALUE></NATIONALITY>
              <INDIVIDUAL_ALIAS><QUALITY>Good</QUALITY><ALIAS_NAME>Ayman al-Zawahiri</ALIAS_NAME></INDIVIDUAL_ALIAS>
              <INDIVIDUAL_ALIAS><ALIAS_NAME/></INDIVIDUAL_ALIAS>
            </INDIVIDUAL>
            <INDIVIDUAL><FIRST_NAME>NO ID</FIRST_NAME></INDIVIDUAL>
          </INDIVIDUALS>
          <ENTITIES>
            <ENTITY>
              <DATAID>110</DATAID>
              <FIRST_NAME>AL RASHID TRUST</FIRST_NAME>
              <UN_LIST_TYPE>Al-Qaida</UN_LIST_TYPE>
              <ENTITY_ADDRESS><STREET>Kitab Mahal</STREET><CITY>Karachi</CITY><COUNTRY>Pakistan</COUNTRY></ENTITY_ADDRESS>
            </ENTITY>
          </ENTITIES>
        </CONSOLIDATED_LIST>"#;
        let out = fragments(SourceFile::UnConsolidated, xml);

        let individual: Vec<_> = out
            .iter()
            .filter(|f| f.entity_id == "6908555")
            .map(|f| &f.attribute)
            .collect();
        assert_eq!(
            individual,
            vec![
                &FragmentAttribute::Primary("AYMAN MUHAMMED RABI".into()),
                &FragmentAttribute::Alias("Ayman al-Zawahiri".into()),
                &FragmentAttribute::Program("UN: Al-Qaida".into()),
                &FragmentAttribute::Address("Nationality: Egypt".into()),
            ]
        );
        assert!(out.iter().any(|f| f.entity_id == "110"
            && f.attribute == FragmentAttribute::Address("Kitab Mahal, Karachi, Pakistan".into())));
        assert!(out.iter().all(|f| f.source_list == "UN"));
    }

    #[test]
    fn test_sema_records() {
        let xml = r#"<data-set>
          <record><Country>Russia</Country><Schedule>1, Part 1</Schedule><Item>42</Item>
            <LastName>Putin</LastName><GivenName>Vladimir Vladimirovich</GivenName>
            <DateOfBirth>1952-10-07</DateOfBirth></record>
          <record><Entity>Wagner Group</Entity><Aliases><Alias>PMC Wagner</Alias></Aliases></record>
          <record><Schedule>2</Schedule></record>
        </data-set>"#;
        let out = fragments(SourceFile::CaSema, xml);

        assert_eq!(out[0].entity_id, "42");
        assert_eq!(
            out[0].attribute,
            FragmentAttribute::Primary("Vladimir Vladimirovich Putin".into())
        );
        assert!(out.contains(&EntityFragment {
            source_list: "CA".into(),
            entity_id: "42".into(),
            attribute: FragmentAttribute::Address("DOB: 1952-10-07".into()),
        }));

        let wagner_id = pseudo_id("CA", "Wagner Group");
        assert!(out.iter().any(|f| f.entity_id == wagner_id
            && f.attribute == FragmentAttribute::Alias("PMC Wagner".into())));
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_seco_targets() {
        let xml = r#"<swiss-sanctions-list>
          <target ssid="1234" sanctions-set-id="9">
            <individual>
              <identity ssid="1" main="true">
                <name name-type="primary-name">
                  <name-part order="1" name-part-type="given-name"><value>Igor</value></name-part>
                  <name-part order="2" name-part-type="family-name"><value>Rotenberg</value></name-part>
                </name>
                <name name-type="alias"><name-part><value>Igor Arkadyevich Rotenberg</value></name-part></name>
              </identity>
            </individual>
          </target>
          <target><entity><identity><name><name-part><value>No ssid</value></name-part></name></identity></entity></target>
        </swiss-sanctions-list>"#;
        let out = fragments(SourceFile::ChSeco, xml);

        assert_eq!(
            out.iter().map(|f| &f.attribute).collect::<Vec<_>>(),
            vec![
                &FragmentAttribute::Primary("Igor Rotenberg".into()),
                &FragmentAttribute::Primary("Igor Arkadyevich Rotenberg".into()),
            ]
        );
        assert!(out.iter().all(|f| f.entity_id == "1234" && f.source_list == "CH"));
    }
}

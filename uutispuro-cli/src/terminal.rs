use uutispuro_core::feed::{ContainerPort, RenderedItem, VisibleList};

/// Prints every change of the visible list to stdout.
#[derive(Debug, Default)]
pub struct TerminalContainer {
    list: VisibleList,
}

impl TerminalContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerPort for TerminalContainer {
    fn contains(&self, id: &str) -> bool {
        self.list.contains(id)
    }

    fn prepend(&mut self, item: RenderedItem) {
        println!(
            "+ {}  {:<12} [{}]  {}\n    {}  ({})",
            item.date, item.source, item.category_label, item.title, item.link, item.category_href
        );
        self.list.prepend(item);
    }

    fn evict_oldest(&mut self) -> Option<RenderedItem> {
        let evicted = self.list.evict_oldest()?;
        println!("- {}", evicted.title);
        Some(evicted)
    }

    fn len(&self) -> usize {
        self.list.len()
    }
}

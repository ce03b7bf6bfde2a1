/// Per-destination connection state.
///
/// Every destination is either down (`None`) or holds a live connection.  The registry keeps the
/// destinations in the order they were configured and is owned by the control loop alone.
pub(crate) struct Registry<C> {
    entries: Vec<(String, Option<C>)>,
}

impl<C> Registry<C> {
    /// Creates a registry where every destination is down.
    pub(crate) fn new<I: IntoIterator<Item = String>>(urls: I) -> Registry<C> {
        Registry {
            entries: urls.into_iter().map(|url| (url, None)).collect(),
        }
    }

    pub(crate) fn urls(&self) -> Vec<String> { self.entries.iter().map(|(url, _)| url.clone()).collect() }

    /// Installs a live connection for `url`, returning the connection it replaced, if any.
    pub(crate) fn install(&mut self, url: String, conn: C) -> Option<C> {
        match self.entries.iter().position(|(u, _)| *u == url) {
            Some(i) => self.entries[i].1.replace(conn),
            None => {
                self.entries.push((url, Some(conn)));
                None
            },
        }
    }

    /// Marks `url` as down, returning the connection it held, if any.
    pub(crate) fn clear(&mut self, url: &str) -> Option<C> {
        self.entries
            .iter_mut()
            .find(|(u, _)| u == url)
            .and_then(|(_, slot)| slot.take())
    }

    #[cfg(test)]
    pub(crate) fn is_live(&self, url: &str) -> bool {
        self.entries.iter().any(|(u, slot)| u == url && slot.is_some())
    }

    /// Iterates over the destinations that currently hold a live connection.
    pub(crate) fn live_mut(&mut self) -> impl Iterator<Item = (&str, &mut C)> {
        self.entries
            .iter_mut()
            .filter_map(|(url, slot)| slot.as_mut().map(move |conn| (url.as_str(), conn)))
    }
}

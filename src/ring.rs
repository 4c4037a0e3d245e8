//! スラブ上の双方向リンクリスト。
//!
//! ノードは `Vec` のスロットに置き、前後リンクはインデックスで持つ。
//! 要素を指す [`Handle`] は削除されるまで安定で、末尾への移動（最近使った要素の昇格）と
//! ハンドル指定の削除がどちらも O(1) で行える。
//! 削除されたスロットは再利用されるが、世代番号により古いハンドルは無効と判定される。

/// リング内の要素を指すハンドル。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// 先頭（最古）から末尾（最新）へ並ぶ双方向リスト。
#[derive(Debug, Clone)]
pub struct Ring<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for Ring<T> {
    fn default() -> Self {
        Ring::new()
    }
}

impl<T> Ring<T> {
    pub fn new() -> Self {
        Ring {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, index: usize) -> &Node<T> {
        match &self.slots[index].node {
            Some(n) => n,
            None => unreachable!("ring link points at a free slot"),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        match &mut self.slots[index].node {
            Some(n) => n,
            None => unreachable!("ring link points at a free slot"),
        }
    }

    fn handle(&self, index: usize) -> Handle {
        Handle {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// ハンドルが現存する要素を指していればそのスロット番号を返す。
    fn resolve(&self, h: Handle) -> Option<usize> {
        let slot = self.slots.get(h.index)?;
        (slot.generation == h.generation && slot.node.is_some()).then_some(h.index)
    }

    pub fn contains(&self, h: Handle) -> bool {
        self.resolve(h).is_some()
    }

    // ── 参照 ──────────────────────────────

    pub fn get(&self, h: Handle) -> Option<&T> {
        let i = self.resolve(h)?;
        Some(&self.node(i).value)
    }

    pub fn get_mut(&mut self, h: Handle) -> Option<&mut T> {
        let i = self.resolve(h)?;
        Some(&mut self.node_mut(i).value)
    }

    pub fn front(&self) -> Option<Handle> {
        self.head.map(|i| self.handle(i))
    }

    pub fn back(&self) -> Option<Handle> {
        self.tail.map(|i| self.handle(i))
    }

    pub fn next(&self, h: Handle) -> Option<Handle> {
        let i = self.resolve(h)?;
        self.node(i).next.map(|n| self.handle(n))
    }

    pub fn prev(&self, h: Handle) -> Option<Handle> {
        let i = self.resolve(h)?;
        self.node(i).prev.map(|p| self.handle(p))
    }

    /// 先頭から末尾へ走査する。
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            cur: self.head,
            back: false,
        }
    }

    /// 末尾から先頭へ走査する。
    pub fn iter_rev(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            cur: self.tail,
            back: true,
        }
    }

    /// 先頭から走査し、ハンドルも併せて返す。
    pub fn handles(&self) -> Vec<Handle> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Some(i) = cur {
            out.push(self.handle(i));
            cur = self.node(i).next;
        }
        out
    }

    // ── 変更 ──────────────────────────────

    fn alloc(&mut self, value: T) -> usize {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(i) => {
                let slot = &mut self.slots[i];
                slot.generation = slot.generation.wrapping_add(1);
                slot.node = Some(node);
                i
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        }
    }

    fn link_back(&mut self, i: usize) {
        let tail = self.tail;
        {
            let n = self.node_mut(i);
            n.prev = tail;
            n.next = None;
        }
        match tail {
            Some(t) => self.node_mut(t).next = Some(i),
            None => self.head = Some(i),
        }
        self.tail = Some(i);
    }

    fn link_front(&mut self, i: usize) {
        let head = self.head;
        {
            let n = self.node_mut(i);
            n.prev = None;
            n.next = head;
        }
        match head {
            Some(h) => self.node_mut(h).prev = Some(i),
            None => self.tail = Some(i),
        }
        self.head = Some(i);
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = {
            let n = self.node(i);
            (n.prev, n.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    pub fn push_back(&mut self, value: T) -> Handle {
        let i = self.alloc(value);
        self.link_back(i);
        self.len += 1;
        self.handle(i)
    }

    pub fn push_front(&mut self, value: T) -> Handle {
        let i = self.alloc(value);
        self.link_front(i);
        self.len += 1;
        self.handle(i)
    }

    /// 要素を削除して値を返す。無効なハンドルなら `None`。
    pub fn remove(&mut self, h: Handle) -> Option<T> {
        let i = self.resolve(h)?;
        self.unlink(i);
        self.len -= 1;
        self.free.push(i);
        self.slots[i].node.take().map(|n| n.value)
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let h = self.front()?;
        self.remove(h)
    }

    /// 要素を末尾へ移動する。ハンドルは変わらない。
    pub fn move_to_back(&mut self, h: Handle) -> bool {
        let Some(i) = self.resolve(h) else {
            return false;
        };
        if self.tail != Some(i) {
            self.unlink(i);
            self.link_back(i);
        }
        true
    }

    /// 要素を先頭へ移動する。ハンドルは変わらない。
    pub fn move_to_front(&mut self, h: Handle) -> bool {
        let Some(i) = self.resolve(h) else {
            return false;
        };
        if self.head != Some(i) {
            self.unlink(i);
            self.link_front(i);
        }
        true
    }

    /// 条件を満たす要素をすべて削除し、削除数を返す。
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut removed = 0;
        for h in self.handles() {
            let drop = self.get(h).is_some_and(|v| !keep(v));
            if drop {
                self.remove(h);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }
}

pub struct Iter<'a, T> {
    ring: &'a Ring<T>,
    cur: Option<usize>,
    back: bool,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let i = self.cur?;
        let node = self.ring.node(i);
        self.cur = if self.back { node.prev } else { node.next };
        Some(&node.value)
    }
}
